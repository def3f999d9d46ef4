use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::dns::constants::DNS_PORT;
use crate::dns::rdata::{DnskeyRecord, InvalidDnskeyText};

/// Root KSK-2017 (key tag 20326), presentation form.
pub const ROOT_KSK_2017: &str = "257 3 8 AwEAAaz/tAm8yTn4Mfeh5eyI96WSVexTBAvkMgJzkKTOiW1vkIbzxeF3+/4RgWOq7HrxRixHlFlExOLAJr5emLvN7SWXgnLh4+B5xQlNVz8Og8kvArMtNROxVQuCaSnIDdD5LKyWbRd2n9WGe2R8PzgCmr3EgVLrjyBxWezF0jLHwVN8efS3rCj/EWgvIWgb9tarpVUDK/b58Da+sqqls3eNbuv7pr+eoZG+SrDK6nWeL3c6H5Apxz7LjVc1uTIdsIXxuOLYA4/ilBmSVIzuDWfdRUfhHdY6+cn8HFRm+2hM8AnXGXws9555KrUB5qihylGa8subX2Nn6UwNR1AkUTV74bU=";

/// IPv4 addresses of a.root-servers.net through m.root-servers.net.
pub const ROOT_HINTS: [Ipv4Addr; 13] = [
    Ipv4Addr::new(198, 41, 0, 4),
    Ipv4Addr::new(170, 247, 170, 2),
    Ipv4Addr::new(192, 33, 4, 12),
    Ipv4Addr::new(199, 7, 91, 13),
    Ipv4Addr::new(192, 203, 230, 10),
    Ipv4Addr::new(192, 5, 5, 241),
    Ipv4Addr::new(192, 112, 36, 4),
    Ipv4Addr::new(198, 97, 190, 53),
    Ipv4Addr::new(192, 36, 148, 17),
    Ipv4Addr::new(192, 58, 128, 30),
    Ipv4Addr::new(193, 0, 14, 129),
    Ipv4Addr::new(199, 7, 83, 42),
    Ipv4Addr::new(202, 12, 27, 33),
];

/// Where trust starts: the root key-signing key and the servers to ask first.
/// Fixed for the lifetime of a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    ksk: DnskeyRecord,
    root_servers: Vec<SocketAddr>,
}

impl TrustAnchor {
    pub fn new(ksk: DnskeyRecord, root_servers: Vec<SocketAddr>) -> Self {
        Self { ksk, root_servers }
    }

    /// Anchor from DNSKEY presentation text and explicit root servers.
    pub fn from_text(ksk: &str, root_servers: Vec<SocketAddr>) -> Result<Self, InvalidDnskeyText> {
        Ok(Self::new(ksk.parse()?, root_servers))
    }

    pub fn ksk(&self) -> &DnskeyRecord {
        &self.ksk
    }

    pub fn root_servers(&self) -> &[SocketAddr] {
        &self.root_servers
    }
}

pub fn default_root_servers() -> Vec<SocketAddr> {
    ROOT_HINTS
        .iter()
        .map(|ip| SocketAddr::new(IpAddr::V4(*ip), DNS_PORT))
        .collect()
}

fn root_ksk_2017() -> DnskeyRecord {
    match ROOT_KSK_2017.parse() {
        Ok(key) => key,
        Err(e) => unreachable!("compiled-in root KSK is valid: {e}"),
    }
}

impl Default for TrustAnchor {
    fn default() -> Self {
        Self::new(root_ksk_2017(), default_root_servers())
    }
}
