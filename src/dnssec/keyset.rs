use std::collections::HashMap;

use crate::dns::rdata::DnskeyRecord;

/// A zone together with DNSKEYs that have been validated for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedZone {
    pub owner: String,
    pub keys: Vec<DnskeyRecord>,
}

impl TrustedZone {
    pub fn new(owner: impl Into<String>, keys: Vec<DnskeyRecord>) -> Self {
        Self {
            owner: owner.into(),
            keys,
        }
    }
}

/// Zones validated during one resolution, in the order they were trusted.
/// Append-only.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, Vec<DnskeyRecord>>,
    order: Vec<String>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a validated zone. A zone already present is left untouched and
    /// `false` is returned.
    pub fn insert(&mut self, zone: &TrustedZone) -> bool {
        if self.keys.contains_key(&zone.owner) {
            return false;
        }
        self.keys.insert(zone.owner.clone(), zone.keys.clone());
        self.order.push(zone.owner.clone());
        true
    }

    pub fn get(&self, owner: &str) -> Option<&[DnskeyRecord]> {
        self.keys.get(owner).map(Vec::as_slice)
    }

    /// The zone validated most recently, with its keys.
    pub fn last(&self) -> Option<TrustedZone> {
        let owner = self.order.last()?;
        self.get(owner)
            .map(|keys| TrustedZone::new(owner.clone(), keys.to_vec()))
    }

    /// Validated zone names, root first.
    pub fn chain(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
