//! Iterative descent from a validated referral towards the zone that answers.
//!
//! Each hop asks every candidate server of the current zone, in the order the
//! parent listed them, for the query itself and for the zone's DNSKEY set.
//! The first usable reply decides the hop.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dns::DNSPacket;
use crate::dns::constants::DNS_PORT;
use crate::dns::enums::DNSResourceType;
use crate::dnssec::{DnsSecError, KeySet, ResponseClassifier, TrustChainValidator, TrustedZone};
use crate::transport::{DnsResponse, Transport};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    #[error("Delegation loop: {0} already visited")]
    LoopDetected(String),
    #[error("Gave up after {0} delegations")]
    HopLimit(usize),
    #[error("No server for {0} gave a usable response")]
    Exhausted(String),
}

/// Where the walk stands: the zone to ask next, who to ask, and the parent
/// data its keys will be checked against.
#[derive(Clone, Debug)]
pub struct DelegationState {
    pub zone: String,
    pub candidates: Vec<SocketAddr>,
    /// Validated keys of the zone that issued the referral
    pub parent: TrustedZone,
    /// The referral itself; its DS set vouches for `zone`
    pub parent_response: DNSPacket,
}

impl DelegationState {
    /// State for the child named in `referral`, with candidates taken from
    /// its glue. `None` if the referral names no zone.
    pub fn from_referral(parent: TrustedZone, referral: DNSPacket) -> Option<Self> {
        let zone = referral.referral_zone()?;
        let candidates = referral
            .glue_addresses()
            .into_iter()
            .map(|ip| SocketAddr::new(IpAddr::V4(ip), DNS_PORT))
            .collect();
        Some(Self {
            zone,
            candidates,
            parent,
            parent_response: referral,
        })
    }
}

/// Zones entered during one walk.
#[derive(Debug, Default)]
pub struct VisitedSet {
    zones: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, zone: &str) -> Result<(), WalkError> {
        if self.zones.insert(zone.to_string()) {
            Ok(())
        } else {
            Err(WalkError::LoopDetected(zone.to_string()))
        }
    }

    pub fn contains(&self, zone: &str) -> bool {
        self.zones.contains(zone)
    }
}

#[derive(Clone, Debug)]
pub enum WalkOutcome {
    /// Reply from the zone most recently added to the key set
    Answer(DnsResponse),
    NoDnssec,
    NoAnswer(DnsResponse),
    VerifyFail(DnsSecError),
}

/// Result of one hop.
#[derive(Debug)]
pub enum HopOutcome {
    Done(WalkOutcome),
    /// The zone answered and its keys validated
    Answer {
        response: DnsResponse,
        trusted: TrustedZone,
    },
    Descend {
        trusted: TrustedZone,
        next: DelegationState,
    },
}

pub struct DelegationWalker<'a> {
    transport: &'a dyn Transport,
    validator: &'a TrustChainValidator,
    max_hops: usize,
    hops: usize,
    visited: VisitedSet,
}

impl<'a> DelegationWalker<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        validator: &'a TrustChainValidator,
        max_hops: usize,
    ) -> Self {
        Self {
            transport,
            validator,
            max_hops,
            hops: 0,
            visited: VisitedSet::new(),
        }
    }

    /// Zones queried so far.
    pub fn hops(&self) -> usize {
        self.hops
    }

    /// Mark a zone as already entered, e.g. the root the walk starts under.
    pub fn mark_visited(&mut self, zone: &str) -> Result<(), WalkError> {
        self.visited.enter(zone)
    }

    /// Descend from `start` until a zone answers, the chain breaks, or the
    /// walk runs out of servers or hops. Every zone that validates is added
    /// to `keys` before its referral is followed.
    pub async fn walk(
        &mut self,
        name: &str,
        qtype: DNSResourceType,
        start: DelegationState,
        keys: &mut KeySet,
    ) -> Result<WalkOutcome, WalkError> {
        let mut state = start;
        self.visited.enter(&state.zone)?;

        while self.hops < self.max_hops {
            self.hops += 1;
            debug!(
                "Hop {}: {} via {} candidates (parent {})",
                self.hops,
                state.zone,
                state.candidates.len(),
                state.parent.owner
            );

            match self.hop(name, qtype, &state).await? {
                HopOutcome::Done(outcome) => return Ok(outcome),
                HopOutcome::Answer { response, trusted } => {
                    keys.insert(&trusted);
                    return Ok(WalkOutcome::Answer(response));
                }
                HopOutcome::Descend { trusted, next } => {
                    info!("Zone {} validated, descending to {}", trusted.owner, next.zone);
                    keys.insert(&trusted);
                    self.visited.enter(&next.zone)?;
                    state = next;
                }
            }
        }

        warn!("Hop limit {} reached at {}", self.max_hops, state.zone);
        Err(WalkError::HopLimit(self.max_hops))
    }

    async fn query_usable(
        &self,
        name: &str,
        qtype: DNSResourceType,
        server: SocketAddr,
    ) -> Option<DnsResponse> {
        match self.transport.query(name, qtype, server).await {
            Ok(response) if response.packet.is_server_failure() => {
                warn!(
                    "{} answered {} {} with rcode {}",
                    server, name, qtype, response.packet.header.rcode
                );
                None
            }
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Query {} {} to {} failed: {}", name, qtype, server, e);
                None
            }
        }
    }

    async fn hop(
        &self,
        name: &str,
        qtype: DNSResourceType,
        state: &DelegationState,
    ) -> Result<HopOutcome, WalkError> {
        for &server in &state.candidates {
            let Some(response) = self.query_usable(name, qtype, server).await else {
                continue;
            };
            let Some(key_response) = self
                .query_usable(&state.zone, DNSResourceType::DNSKEY, server)
                .await
            else {
                continue;
            };

            if !response.packet.answers.is_empty() {
                return Ok(match self.validate_zone(state, &key_response.packet) {
                    Ok(trusted) => HopOutcome::Answer { response, trusted },
                    Err(e) => HopOutcome::Done(chain_failure(e)),
                });
            }

            if response.packet.is_negative() {
                debug!("{} reports no data for {} {}", server, name, qtype);
                return Ok(HopOutcome::Done(WalkOutcome::NoAnswer(response)));
            }

            if !ResponseClassifier::has_ds(&response.packet) {
                info!("Referral from {} carries no DS", state.zone);
                return Ok(HopOutcome::Done(WalkOutcome::NoDnssec));
            }

            let Some(next) = DelegationState::from_referral(
                TrustedZone::new(state.zone.clone(), Vec::new()),
                response.packet.clone(),
            ) else {
                warn!("{} sent DS without a delegation", server);
                continue;
            };

            if self.visited.contains(&next.zone) {
                return Err(WalkError::LoopDetected(next.zone));
            }

            let trusted = match self.validate_referral(state, &response.packet, &key_response.packet)
            {
                Ok(trusted) => trusted,
                Err(e) => return Ok(HopOutcome::Done(chain_failure(e))),
            };

            if next.candidates.is_empty() {
                warn!("Referral to {} from {} has no glue", next.zone, server);
                continue;
            }

            return Ok(HopOutcome::Descend {
                next: DelegationState {
                    parent: trusted.clone(),
                    ..next
                },
                trusted,
            });
        }

        Err(WalkError::Exhausted(state.zone.clone()))
    }

    /// Self-signed DNSKEY set for the current zone, bound to the parent's DS.
    fn validate_zone(
        &self,
        state: &DelegationState,
        key_response: &DNSPacket,
    ) -> Result<TrustedZone, DnsSecError> {
        let trusted = self.validator.verify_dnskey_self_consistency(key_response)?;
        if trusted.owner != state.zone {
            return Err(DnsSecError::DsMismatch(format!(
                "DNSKEY owner {} is not {}",
                trusted.owner, state.zone
            )));
        }
        self.validator
            .verify_delegation_binding(key_response, &state.parent_response)?;
        Ok(trusted)
    }

    /// As [`validate_zone`](Self::validate_zone), plus the child DS set in
    /// `referral` signed by the now trusted keys.
    fn validate_referral(
        &self,
        state: &DelegationState,
        referral: &DNSPacket,
        key_response: &DNSPacket,
    ) -> Result<TrustedZone, DnsSecError> {
        let trusted = self.validate_zone(state, key_response)?;
        self.validator
            .verify_answer_or_ds(referral, &trusted, DNSResourceType::DS)?;
        Ok(trusted)
    }
}

/// Missing DNSSEC material ends the walk as unsupported; anything else that
/// failed to validate is a verification failure.
pub fn chain_failure(err: DnsSecError) -> WalkOutcome {
    if err.is_unsigned() {
        info!("No DNSSEC material: {}", err);
        WalkOutcome::NoDnssec
    } else {
        warn!("DNSSEC validation failed: {}", err);
        WalkOutcome::VerifyFail(err)
    }
}
