use std::sync::Arc;
use tracing::{debug, info};

use super::classifier::{ResponseClassifier, Section};
use super::{CryptoVerifier, DigestType, DnsSecError, RecordSet, TrustAnchor, TrustedZone};
use crate::dns::DNSPacket;
use crate::dns::enums::DNSResourceType;
use crate::dns::rdata::DnskeyRecord;

pub type Result<T> = std::result::Result<T, DnsSecError>;

/// Chain-of-trust checks. Callers run them in order: root keys once, then
/// per zone self-consistency before delegation binding and answer checks.
pub struct TrustChainValidator {
    anchor: DnskeyRecord,
    crypto: Arc<dyn CryptoVerifier>,
    classifier: ResponseClassifier,
}

impl TrustChainValidator {
    pub fn new(
        anchor: &TrustAnchor,
        crypto: Arc<dyn CryptoVerifier>,
        classifier: ResponseClassifier,
    ) -> Self {
        Self {
            anchor: anchor.ksk().clone(),
            crypto,
            classifier,
        }
    }

    pub fn classifier(&self) -> &ResponseClassifier {
        &self.classifier
    }

    /// The root DNSKEY set must contain a KSK identical to the anchor.
    pub fn verify_root_keys<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a DnskeyRecord>,
    ) -> Result<()> {
        if keys
            .into_iter()
            .any(|key| key.is_ksk() && *key == self.anchor)
        {
            debug!("Root KSK {} matches trust anchor", self.anchor.key_tag());
            Ok(())
        } else {
            Err(DnsSecError::PubKskMismatch)
        }
    }

    /// The DNSKEY set in `response` must be signed by one of its own keys.
    /// Returns the zone and its now self-validated keys.
    pub fn verify_dnskey_self_consistency(&self, response: &DNSPacket) -> Result<TrustedZone> {
        let classified = self.classifier.classify(response, DNSResourceType::DNSKEY)?;
        let rrset = classified.rrset.ok_or_else(|| {
            DnsSecError::NoDnsKey(
                response
                    .questions
                    .first()
                    .map(|q| q.name())
                    .unwrap_or_default(),
            )
        })?;

        let zone = TrustedZone::new(rrset.owner(), rrset.dnskeys().cloned().collect());
        self.crypto
            .validate_signature(&rrset, &classified.signatures, &zone)?;

        debug!(
            "DNSKEY set for {} is self-signed ({} keys)",
            zone.owner,
            zone.keys.len()
        );
        Ok(zone)
    }

    /// RRSIG over the `qtype` RRset, drawn from the section the classifier's
    /// table names, must verify under `trusted`.
    pub fn verify_answer_or_ds(
        &self,
        response: &DNSPacket,
        trusted: &TrustedZone,
        qtype: DNSResourceType,
    ) -> Result<RecordSet> {
        let section = self.classifier.table().section_for(qtype);
        self.verify_rrset_in(response, section, trusted, qtype)
    }

    /// As [`verify_answer_or_ds`](Self::verify_answer_or_ds) but always reads
    /// the answer section.
    pub fn verify_final_answer(
        &self,
        response: &DNSPacket,
        trusted: &TrustedZone,
        qtype: DNSResourceType,
    ) -> Result<RecordSet> {
        self.verify_rrset_in(response, Section::Answer, trusted, qtype)
    }

    fn verify_rrset_in(
        &self,
        response: &DNSPacket,
        section: Section,
        trusted: &TrustedZone,
        qtype: DNSResourceType,
    ) -> Result<RecordSet> {
        let classified = self.classifier.classify_section(response, section, qtype)?;
        let rrset = classified.rrset.ok_or(match qtype {
            DNSResourceType::DS => DnsSecError::NoDs,
            _ => DnsSecError::MissingRecords(qtype),
        })?;

        self.crypto
            .validate_signature(&rrset, &classified.signatures, trusted)?;
        debug!(
            "{} {} verified under {}",
            rrset.owner(),
            rrset.rtype(),
            trusted.owner
        );
        Ok(rrset)
    }

    /// Some DS in the parent's referral must be the digest of a KSK in the
    /// child's DNSKEY response.
    pub fn verify_delegation_binding(
        &self,
        child_dnskey_response: &DNSPacket,
        parent_ds_response: &DNSPacket,
    ) -> Result<()> {
        let ds_set = self
            .classifier
            .classify(parent_ds_response, DNSResourceType::DS)?
            .rrset
            .ok_or(DnsSecError::NoDs)?;
        let key_set = self
            .classifier
            .classify(child_dnskey_response, DNSResourceType::DNSKEY)?
            .rrset
            .ok_or_else(|| DnsSecError::NoDnsKey(ds_set.owner().to_string()))?;

        let zone = key_set.owner();
        if ds_set.owner() != zone {
            return Err(DnsSecError::DsMismatch(format!(
                "DS owner {} is not DNSKEY owner {}",
                ds_set.owner(),
                zone
            )));
        }

        let ksks: Vec<&DnskeyRecord> = key_set.dnskeys().filter(|k| k.is_ksk()).collect();
        if ksks.is_empty() {
            return Err(DnsSecError::NoKsk(zone.to_string()));
        }

        let mut unsupported = None;
        for ds in ds_set.ds_records() {
            let Some(digest_type) = DigestType::from_u8(ds.digest_type).filter(|d| d.is_supported())
            else {
                unsupported = Some(ds.digest_type);
                continue;
            };

            for ksk in ksks
                .iter()
                .filter(|k| k.algorithm == ds.algorithm && k.key_tag() == ds.key_tag)
            {
                if self.crypto.compute_ds(zone, ksk, digest_type)? == *ds {
                    info!(
                        "DS {} {} binds KSK {} for {}",
                        ds.key_tag, digest_type, ksk.key_tag(), zone
                    );
                    return Ok(());
                }
            }
        }

        match unsupported {
            Some(digest_type) if ds_set.ds_records().all(|ds| ds.digest_type == digest_type) => {
                Err(DnsSecError::UnsupportedDigestType(digest_type))
            }
            _ => Err(DnsSecError::DsMismatch(zone.to_string())),
        }
    }
}
