use std::fmt;

use super::DnsSecError;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::rdata::{DnskeyRecord, DsRecord};
use crate::dns::resource::DNSResource;

/// Records sharing one owner name and type, in the order received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSet {
    owner: String,
    rtype: DNSResourceType,
    records: Vec<DNSResource>,
}

impl RecordSet {
    /// Group `records`; all must carry the same owner (case-insensitive) and
    /// type. Returns `Ok(None)` for an empty input.
    pub fn from_records(records: Vec<DNSResource>) -> Result<Option<Self>, DnsSecError> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        let owner = first.owner();
        let rtype = first.rtype;

        for rr in &records[1..] {
            let other = rr.owner();
            if other != owner {
                return Err(DnsSecError::MixedOwners(owner, other));
            }
            if rr.rtype != rtype {
                return Err(DnsSecError::MissingRecords(rtype));
            }
        }

        Ok(Some(Self {
            owner,
            rtype,
            records,
        }))
    }

    /// Lowercased owner name with trailing dot.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn rtype(&self) -> DNSResourceType {
        self.rtype
    }

    pub fn rclass(&self) -> DNSResourceClass {
        self.records
            .first()
            .map(|rr| rr.rclass)
            .unwrap_or(DNSResourceClass::IN)
    }

    pub fn records(&self) -> &[DNSResource] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dnskeys(&self) -> impl Iterator<Item = &DnskeyRecord> {
        self.records.iter().filter_map(|rr| rr.as_dnskey())
    }

    pub fn ds_records(&self) -> impl Iterator<Item = &DsRecord> {
        self.records.iter().filter_map(|rr| rr.as_ds())
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rr) in self.records.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", rr)?;
        }
        Ok(())
    }
}
