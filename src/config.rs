use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

use crate::dns::constants::{DEFAULT_UDP_PAYLOAD_SIZE, DNS_PORT};
use crate::dns::rdata::DnskeyRecord;
use crate::dnssec::TrustAnchor;
use crate::dnssec::trust_anchor::default_root_servers;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid root server: {0}")]
    InvalidRootServer(String),
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
    #[error("Invalid UDP payload size: {0}")]
    InvalidPayloadSize(String),
    #[error("Invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Root servers tried in order
    pub root_servers: Vec<SocketAddr>,

    /// Root key-signing key every chain must start from
    pub trust_anchor: DnskeyRecord,

    /// Per-query timeout
    pub query_timeout: Duration,

    /// Maximum delegations followed below the root
    pub max_hops: usize,

    /// Maximum CNAME restarts per resolution
    pub max_redirections: usize,

    /// EDNS0 payload size advertised on queries
    pub udp_payload_size: u16,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let anchor = TrustAnchor::default();
        Self {
            root_servers: default_root_servers(),
            trust_anchor: anchor.ksk().clone(),
            query_timeout: Duration::from_secs(5),
            max_hops: 16,
            max_redirections: 8,
            udp_payload_size: DEFAULT_UDP_PAYLOAD_SIZE,
        }
    }
}

impl ResolverConfig {
    /// Defaults overridden by `SIGWALK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `SIGWALK_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(root_servers) = lookup("SIGWALK_ROOT_SERVERS") {
            let servers = root_servers
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(parse_server)
                .collect::<Result<Vec<_>, _>>()?;
            if servers.is_empty() {
                return Err(ConfigError::InvalidRootServer(
                    "No valid root servers provided".to_string(),
                ));
            }
            config.root_servers = servers;
        }

        if let Some(timeout_str) = lookup("SIGWALK_QUERY_TIMEOUT") {
            let timeout_secs = timeout_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
            if timeout_secs == 0 {
                return Err(ConfigError::InvalidTimeout(
                    "Timeout must be greater than 0".to_string(),
                ));
            }
            config.query_timeout = Duration::from_secs(timeout_secs);
        }

        if let Some(max_hops) = lookup("SIGWALK_MAX_HOPS") {
            config.max_hops = max_hops
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLimit(max_hops.clone()))?;
        }

        if let Some(max_redirections) = lookup("SIGWALK_MAX_REDIRECTIONS") {
            config.max_redirections = max_redirections
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLimit(max_redirections.clone()))?;
        }

        if let Some(payload) = lookup("SIGWALK_UDP_PAYLOAD_SIZE") {
            config.udp_payload_size = payload
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPayloadSize(payload.clone()))?;
        }

        if let Some(anchor) = lookup("SIGWALK_TRUST_ANCHOR") {
            config.trust_anchor = anchor
                .parse()
                .map_err(|_| ConfigError::InvalidTrustAnchor(anchor.clone()))?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_servers.is_empty() {
            return Err(ConfigError::InvalidRootServer(
                "At least one root server is required".to_string(),
            ));
        }

        if self.query_timeout.is_zero() || self.query_timeout.as_secs() > 300 {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be between 1 and 300 seconds".to_string(),
            ));
        }

        if self.max_hops == 0 || self.max_hops > 64 {
            return Err(ConfigError::InvalidLimit(
                "Max hops must be between 1 and 64".to_string(),
            ));
        }

        if self.max_redirections > 32 {
            return Err(ConfigError::InvalidLimit(
                "Max redirections too large (max 32)".to_string(),
            ));
        }

        if self.udp_payload_size < 512 {
            return Err(ConfigError::InvalidPayloadSize(
                "UDP payload size must be at least 512".to_string(),
            ));
        }

        if !self.trust_anchor.is_ksk() {
            return Err(ConfigError::InvalidTrustAnchor(
                "Trust anchor must be a key-signing key (flags 257)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn trust_anchor(&self) -> TrustAnchor {
        TrustAnchor::new(self.trust_anchor.clone(), self.root_servers.clone())
    }
}

/// `ip` or `ip:port`; the port defaults to 53.
fn parse_server(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    s.parse::<SocketAddr>()
        .or_else(|_| s.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, DNS_PORT)))
        .map_err(|_| ConfigError::InvalidRootServer(s.to_string()))
}
