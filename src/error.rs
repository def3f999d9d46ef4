use std::net::SocketAddr;
use thiserror::Error;

use crate::config::ConfigError;
use crate::dns::ParseError;

/// Failures talking to a single server. The resolver treats every variant as
/// "try the next candidate".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Query to {0} timed out")]
    Timeout(SocketAddr),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Malformed response from {server}: {source}")]
    Malformed {
        server: SocketAddr,
        #[source]
        source: ParseError,
    },

    #[error("Truncated response from {0}")]
    Truncated(SocketAddr),

    #[error("Response ID {got} does not match query ID {expected}")]
    IdMismatch { expected: u16, got: u16 },

    #[error("Response from {server} does not answer the query: {reason}")]
    UnexpectedReply {
        server: SocketAddr,
        reason: &'static str,
    },
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Everything that stops the binary before a resolution starts. Failures
/// during resolution are outcomes, not errors.
#[derive(Error, Debug)]
pub enum SigwalkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SigwalkError>;
