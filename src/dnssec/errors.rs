use thiserror::Error;

use crate::dns::enums::DNSResourceType;

/// DNSSEC validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsSecError {
    /// Zone served no DNSKEY set
    #[error("No DNSKEY record found for {0}")]
    NoDnsKey(String),
    /// Parent referral carried no DS set
    #[error("No DS record found at parent zone")]
    NoDs,
    /// RRset came without a covering RRSIG
    #[error("No RRSIG record found for {0} {1}")]
    NoRrsig(String, DNSResourceType),
    /// DNSKEY set has no key with flags 257
    #[error("No key-signing key in DNSKEY set for {0}")]
    NoKsk(String),
    /// Root KSK differs from the compiled-in trust anchor
    #[error("Root key-signing key does not match the trust anchor")]
    PubKskMismatch,
    #[error("DNSSEC signature verification failed: {0}")]
    SignatureInvalid(String),
    #[error("DS record digest does not match DNSKEY for {0}")]
    DsMismatch(String),
    #[error("DNSSEC signature has expired")]
    SignatureExpired,
    #[error("DNSSEC signature is not yet valid")]
    SignatureNotYetValid,
    #[error("Unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(u8),
    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),
    #[error("Invalid DNSKEY public key format")]
    InvalidPublicKey,
    /// Section held records of the queried type under several owners
    #[error("Record set has multiple owner names: {0} and {1}")]
    MixedOwners(String, String),
    /// Section held no records of the type being validated
    #[error("No {0} records to validate")]
    MissingRecords(DNSResourceType),
}

impl DnsSecError {
    /// Errors meaning the zone offers no DNSSEC material at all, as opposed to
    /// material that failed to validate.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            DnsSecError::NoDnsKey(_) | DnsSecError::NoDs | DnsSecError::NoRrsig(..)
        )
    }
}

pub type Result<T> = std::result::Result<T, DnsSecError>;
