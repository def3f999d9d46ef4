pub mod algorithm;
pub mod classifier;
pub mod crypto;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod keyset;
pub mod rrset;
pub mod trust_anchor;
pub mod validator;

pub use algorithm::DnsSecAlgorithm;
pub use classifier::{Classified, ResponseClassifier, Section, SectionTable};
pub use crypto::{CryptoVerifier, RingVerifier};
pub use digest::DigestType;
pub use errors::DnsSecError;
pub use key_tag::calculate_key_tag;
pub use keyset::{KeySet, TrustedZone};
pub use rrset::RecordSet;
pub use trust_anchor::TrustAnchor;
pub use validator::TrustChainValidator;
