//! Signature and digest primitives behind the [`CryptoVerifier`] seam.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

use super::{DigestType, DnsSecAlgorithm, DnsSecError, RecordSet, TrustedZone};
use crate::dns::common::{label_count, normalize_name, write_name};
use crate::dns::rdata::{DnskeyRecord, DsRecord, RrsigRecord};

/// DNSKEY flag bit marking a zone key (RFC 4034 §2.1.1).
const ZONE_KEY_FLAG: u16 = 0x0100;
/// The only protocol value DNSKEYs may carry.
const DNSKEY_PROTOCOL: u8 = 3;

pub trait CryptoVerifier: Send + Sync {
    /// Succeeds if any of `rrsigs` is a currently valid signature over
    /// `rrset` by one of the zone's keys.
    fn validate_signature(
        &self,
        rrset: &RecordSet,
        rrsigs: &[RrsigRecord],
        trusted: &TrustedZone,
    ) -> Result<(), DnsSecError>;

    fn compute_ds(
        &self,
        owner: &str,
        key: &DnskeyRecord,
        digest_type: DigestType,
    ) -> Result<DsRecord, DnsSecError>;
}

/// [`CryptoVerifier`] backed by `ring`.
#[derive(Clone, Debug, Default)]
pub struct RingVerifier {
    current_time: Option<u32>,
}

impl RingVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier that checks validity windows against a fixed clock.
    pub fn at_time(time: u32) -> Self {
        Self {
            current_time: Some(time),
        }
    }

    fn now(&self) -> u32 {
        self.current_time.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or(0)
        })
    }

    fn verify_one(
        &self,
        rrset: &RecordSet,
        sig: &RrsigRecord,
        trusted: &TrustedZone,
        now: u32,
    ) -> Result<(), DnsSecError> {
        if sig.type_covered != rrset.rtype() {
            return Err(DnsSecError::SignatureInvalid(format!(
                "RRSIG covers {} not {}",
                sig.type_covered,
                rrset.rtype()
            )));
        }
        if normalize_name(&sig.signer_name) != trusted.owner {
            return Err(DnsSecError::SignatureInvalid(format!(
                "signer {} is not {}",
                sig.signer_name, trusted.owner
            )));
        }
        if sig.labels as usize > label_count(rrset.owner()) {
            return Err(DnsSecError::SignatureInvalid(format!(
                "RRSIG label count {} exceeds owner {}",
                sig.labels,
                rrset.owner()
            )));
        }

        let algorithm = DnsSecAlgorithm::from_u8(sig.algorithm)
            .filter(|alg| alg.is_supported())
            .ok_or(DnsSecError::UnsupportedAlgorithm(sig.algorithm))?;

        if now < sig.inception {
            return Err(DnsSecError::SignatureNotYetValid);
        }
        if now > sig.expiration {
            return Err(DnsSecError::SignatureExpired);
        }

        let data = signed_data(rrset, sig);
        let mut result = Err(DnsSecError::SignatureInvalid(format!(
            "no DNSKEY with tag {} for {}",
            sig.key_tag, trusted.owner
        )));

        for key in trusted.keys.iter().filter(|k| {
            k.algorithm == sig.algorithm
                && k.protocol == DNSKEY_PROTOCOL
                && k.flags & ZONE_KEY_FLAG != 0
                && k.key_tag() == sig.key_tag
        }) {
            result = algorithm.verify(&key.public_key, &data, &sig.signature);
            if result.is_ok() {
                break;
            }
        }
        result
    }
}

impl CryptoVerifier for RingVerifier {
    fn validate_signature(
        &self,
        rrset: &RecordSet,
        rrsigs: &[RrsigRecord],
        trusted: &TrustedZone,
    ) -> Result<(), DnsSecError> {
        if rrsigs.is_empty() {
            return Err(DnsSecError::NoRrsig(
                rrset.owner().to_string(),
                rrset.rtype(),
            ));
        }

        let now = self.now();
        let mut last_error = None;
        for sig in rrsigs {
            match self.verify_one(rrset, sig, trusted, now) {
                Ok(()) => {
                    debug!(
                        "RRSIG {} over {} {} verified with key {}",
                        DnsSecAlgorithm::from_u8(sig.algorithm)
                            .map(|a| a.to_string())
                            .unwrap_or_default(),
                        rrset.owner(),
                        rrset.rtype(),
                        sig.key_tag
                    );
                    return Ok(());
                }
                Err(e) => {
                    trace!("RRSIG with key tag {} rejected: {}", sig.key_tag, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DnsSecError::SignatureInvalid(format!("{} {}", rrset.owner(), rrset.rtype()))
        }))
    }

    fn compute_ds(
        &self,
        owner: &str,
        key: &DnskeyRecord,
        digest_type: DigestType,
    ) -> Result<DsRecord, DnsSecError> {
        compute_ds(owner, key, digest_type)
    }
}

/// The byte string an RRSIG signs (RFC 4034 §3.1.8.1): the RRSIG rdata
/// without its signature, then every record in canonical form and order.
pub fn signed_data(rrset: &RecordSet, rrsig: &RrsigRecord) -> Vec<u8> {
    let mut data = Vec::new();
    rrsig.write_header(&mut data, true);

    let mut owner = Vec::new();
    write_name(&mut owner, &signed_owner(rrset.owner(), rrsig.labels), true);

    let mut rdatas: Vec<Vec<u8>> = rrset
        .records()
        .iter()
        .map(|rr| rr.canonical_rdata())
        .collect();
    rdatas.sort();
    rdatas.dedup();

    let rtype: u16 = rrset.rtype().into();
    let rclass: u16 = rrset.rclass().into();
    for rdata in rdatas {
        data.extend_from_slice(&owner);
        data.extend_from_slice(&rtype.to_be_bytes());
        data.extend_from_slice(&rclass.to_be_bytes());
        data.extend_from_slice(&rrsig.original_ttl.to_be_bytes());
        data.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        data.extend_from_slice(&rdata);
    }
    data
}

/// Owner as signed: wildcard-expanded answers are signed under `*.` plus the
/// rightmost `labels` labels (RFC 4035 §5.3.2).
fn signed_owner(owner: &str, labels: u8) -> String {
    let parts: Vec<&str> = owner.split('.').filter(|l| !l.is_empty()).collect();
    let labels = labels as usize;
    if labels >= parts.len() {
        return owner.to_string();
    }
    let suffix = parts[parts.len() - labels..].join(".");
    if suffix.is_empty() {
        "*.".to_string()
    } else {
        format!("*.{}.", suffix)
    }
}

/// DS for `key` published under `owner`: digest over the owner's canonical
/// wire name followed by the DNSKEY rdata.
pub fn compute_ds(
    owner: &str,
    key: &DnskeyRecord,
    digest_type: DigestType,
) -> Result<DsRecord, DnsSecError> {
    let mut name = Vec::new();
    write_name(&mut name, owner, true);
    let digest = digest_type.digest(&[&name, &key.to_wire()])?;
    Ok(DsRecord {
        key_tag: key.key_tag(),
        algorithm: key.algorithm,
        digest_type: digest_type.to_u8(),
        digest,
    })
}
