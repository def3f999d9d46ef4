pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod output;
pub mod resolver;
pub mod transport;

pub use dns::DNSPacket;
pub use resolver::{Resolution, ResolutionOutcome, Resolver, Status};
