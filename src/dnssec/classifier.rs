//! Pulls the records a validation step needs out of a response.
//!
//! Which section to read is looked up in a [`SectionTable`] so callers can
//! change the mapping without touching the classification logic.

use std::collections::HashMap;

use super::{DnsSecError, RecordSet};
use crate::dns::DNSPacket;
use crate::dns::enums::DNSResourceType;
use crate::dns::rdata::RrsigRecord;
use crate::dns::resource::DNSResource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

impl Section {
    fn records<'a>(&self, message: &'a DNSPacket) -> &'a [DNSResource] {
        match self {
            Section::Answer => &message.answers,
            Section::Authority => &message.authorities,
            Section::Additional => &message.resources,
        }
    }
}

/// Query type to response section mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionTable {
    entries: HashMap<DNSResourceType, Section>,
    fallback: Section,
}

impl Default for SectionTable {
    /// DS and NS come from referrals, so the authority section; keys and
    /// addresses from the answer section.
    fn default() -> Self {
        let entries = HashMap::from([
            (DNSResourceType::DS, Section::Authority),
            (DNSResourceType::NS, Section::Authority),
            (DNSResourceType::DNSKEY, Section::Answer),
            (DNSResourceType::A, Section::Answer),
            (DNSResourceType::AAAA, Section::Answer),
        ]);
        Self {
            entries,
            fallback: Section::Answer,
        }
    }
}

impl SectionTable {
    pub fn with(mut self, rtype: DNSResourceType, section: Section) -> Self {
        self.entries.insert(rtype, section);
        self
    }

    pub fn section_for(&self, rtype: DNSResourceType) -> Section {
        self.entries.get(&rtype).copied().unwrap_or(self.fallback)
    }
}

/// Records of one type from one section, with the signatures covering them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classified {
    pub rrset: Option<RecordSet>,
    /// Empty when the zone presents no DNSSEC material for this set.
    pub signatures: Vec<RrsigRecord>,
}

impl Classified {
    pub fn owner(&self) -> Option<&str> {
        self.rrset.as_ref().map(|set| set.owner())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResponseClassifier {
    table: SectionTable,
}

impl ResponseClassifier {
    pub fn new(table: SectionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SectionTable {
        &self.table
    }

    pub fn classify(
        &self,
        message: &DNSPacket,
        qtype: DNSResourceType,
    ) -> Result<Classified, DnsSecError> {
        self.classify_section(message, self.table.section_for(qtype), qtype)
    }

    pub fn classify_section(
        &self,
        message: &DNSPacket,
        section: Section,
        qtype: DNSResourceType,
    ) -> Result<Classified, DnsSecError> {
        let records = section.records(message);

        let primary: Vec<DNSResource> = records
            .iter()
            .filter(|rr| rr.rtype == qtype)
            .cloned()
            .collect();
        let rrset = RecordSet::from_records(primary)?;
        let owner = rrset.as_ref().map(|set| set.owner().to_string());

        let signatures = records
            .iter()
            .filter(|rr| owner.as_deref().is_none_or(|o| rr.owner() == o))
            .filter_map(|rr| rr.as_rrsig())
            .filter(|sig| sig.type_covered == qtype)
            .cloned()
            .collect();

        Ok(Classified { rrset, signatures })
    }

    /// True iff the authority section carries a DS record.
    pub fn has_ds(message: &DNSPacket) -> bool {
        message
            .authorities
            .iter()
            .any(|rr| rr.rtype == DNSResourceType::DS)
    }
}
