//! DNSSEC-validating iterative resolution.
//!
//! [`Resolver::resolve`] tries each root server in turn. At the root it checks
//! the DNSKEY set against the trust anchor and the referral's DS set against
//! the root keys, then hands the walk to [`walker::DelegationWalker`]. Any of
//! those failing, a referral without DS included, abandons that root. The
//! zone that finally answers has its keys bound to the parent's DS before the
//! answer's own signature is checked. CNAME answers restart resolution for
//! the target, a bounded number of times.

pub mod walker;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::dns::common::normalize_name;
use crate::dns::enums::DNSResourceType;
use crate::dnssec::{
    CryptoVerifier, DnsSecError, KeySet, RecordSet, ResponseClassifier, RingVerifier,
    TrustAnchor, TrustChainValidator, TrustedZone,
};
use crate::error::TransportError;
use crate::transport::{DnsResponse, Transport, UdpTransport};
use walker::{DelegationState, DelegationWalker, WalkError, WalkOutcome, chain_failure};

pub const DEFAULT_MAX_HOPS: usize = 16;
pub const DEFAULT_MAX_REDIRECTIONS: usize = 8;

/// Coarse result kind, one per CLI exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    NoError,
    NoDnssec,
    VerifyFail,
    NoAnswer,
    UnknownError,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::NoError => 0,
            Status::NoDnssec => 1,
            Status::VerifyFail => 2,
            Status::UnknownError => 3,
            Status::NoAnswer => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Validated records of the requested type
    Answer(RecordSet),
    /// Some zone on the path is unsigned
    NoDnssec,
    /// DNSSEC material was present and did not validate
    VerifyFail(DnsSecError),
    /// The authoritative server says the name or type does not exist
    NoAnswer,
    UnknownError,
}

impl ResolutionOutcome {
    pub fn status(&self) -> Status {
        match self {
            ResolutionOutcome::Answer(_) => Status::NoError,
            ResolutionOutcome::NoDnssec => Status::NoDnssec,
            ResolutionOutcome::VerifyFail(_) => Status::VerifyFail,
            ResolutionOutcome::NoAnswer => Status::NoAnswer,
            ResolutionOutcome::UnknownError => Status::UnknownError,
        }
    }
}

/// Everything one call to [`Resolver::resolve`] produced.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    /// Last response received for the final name, for display
    pub response: Option<DnsResponse>,
    /// Validated CNAME sets followed on the way, in order
    pub aliases: Vec<RecordSet>,
    /// Zones whose keys were validated on the final attempt, root first
    pub chain: Vec<String>,
    /// Zones queried across all attempts
    pub hops: usize,
}

/// Why a root server was abandoned in favour of the next one.
#[derive(Error, Debug)]
enum RootError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server failure (rcode {0})")]
    ServerFailure(u8),
    #[error("root validation failed: {0}")]
    Validation(#[from] DnsSecError),
    #[error("referral without glue")]
    NoGlue,
    #[error(transparent)]
    Walk(WalkError),
}

/// How one pass for a single name ended.
enum Step {
    Done(ResolutionOutcome, Option<DnsResponse>),
    Alias {
        cnames: RecordSet,
        target: String,
    },
}

struct Attempt {
    step: Step,
    chain: Vec<String>,
    hops: usize,
}

impl Attempt {
    fn done(outcome: ResolutionOutcome, response: Option<DnsResponse>, keys: &KeySet, hops: usize) -> Self {
        Self {
            step: Step::Done(outcome, response),
            chain: keys.chain().to_vec(),
            hops,
        }
    }
}

pub struct Resolver {
    transport: Arc<dyn Transport>,
    validator: TrustChainValidator,
    anchor: TrustAnchor,
    crypto: Arc<dyn CryptoVerifier>,
    max_hops: usize,
    max_redirections: usize,
}

impl Resolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        crypto: Arc<dyn CryptoVerifier>,
        anchor: TrustAnchor,
    ) -> Self {
        let validator =
            TrustChainValidator::new(&anchor, crypto.clone(), ResponseClassifier::default());
        Self {
            transport,
            validator,
            anchor,
            crypto,
            max_hops: DEFAULT_MAX_HOPS,
            max_redirections: DEFAULT_MAX_REDIRECTIONS,
        }
    }

    /// UDP transport and ring verification set up from `config`.
    pub fn from_config(config: &ResolverConfig) -> Self {
        let transport = UdpTransport::new(config.query_timeout, config.udp_payload_size);
        Self::new(
            Arc::new(transport),
            Arc::new(RingVerifier::new()),
            config.trust_anchor(),
        )
        .with_limits(config.max_hops, config.max_redirections)
    }

    pub fn with_limits(mut self, max_hops: usize, max_redirections: usize) -> Self {
        self.max_hops = max_hops;
        self.max_redirections = max_redirections;
        self
    }

    pub fn with_classifier(mut self, classifier: ResponseClassifier) -> Self {
        self.validator = TrustChainValidator::new(&self.anchor, self.crypto.clone(), classifier);
        self
    }

    pub fn trust_anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    pub async fn resolve(&self, hostname: &str, qtype: DNSResourceType) -> Resolution {
        let mut name = normalize_name(hostname);
        let mut seen_aliases = HashSet::from([name.clone()]);
        let mut aliases = Vec::new();
        let mut hops = 0;
        let mut redirections = 0;

        loop {
            info!("Resolving {} {}", name, qtype);
            let attempt = self.resolve_name(&name, qtype).await;
            hops += attempt.hops;

            let (outcome, response) = match attempt.step {
                Step::Done(outcome, response) => (outcome, response),
                Step::Alias { cnames, target } => {
                    let target = normalize_name(&target);
                    aliases.push(cnames);
                    redirections += 1;

                    if redirections > self.max_redirections {
                        warn!("More than {} CNAME redirections", self.max_redirections);
                        (ResolutionOutcome::UnknownError, None)
                    } else if !seen_aliases.insert(target.clone()) {
                        warn!("CNAME loop at {}", target);
                        (ResolutionOutcome::UnknownError, None)
                    } else {
                        debug!("{} is an alias for {}", name, target);
                        name = target;
                        continue;
                    }
                }
            };

            info!("{} {}: {:?}", name, qtype, outcome.status());
            return Resolution {
                outcome,
                response,
                aliases,
                chain: attempt.chain,
                hops,
            };
        }
    }

    /// One pass over the root servers for `name`.
    async fn resolve_name(&self, name: &str, qtype: DNSResourceType) -> Attempt {
        let mut hops = 0;
        for &root in self.anchor.root_servers() {
            let mut keys = KeySet::new();
            match self.try_root(name, qtype, root, &mut keys, &mut hops).await {
                Ok(attempt) => return attempt,
                Err(e) => warn!("Root server {} abandoned: {}", root, e),
            }
        }
        warn!("All root servers exhausted for {} {}", name, qtype);
        Attempt::done(ResolutionOutcome::UnknownError, None, &KeySet::new(), hops)
    }

    async fn try_root(
        &self,
        name: &str,
        qtype: DNSResourceType,
        root: SocketAddr,
        keys: &mut KeySet,
        hops: &mut usize,
    ) -> Result<Attempt, RootError> {
        let response = self.transport.query(name, qtype, root).await?;
        if response.packet.is_server_failure() {
            return Err(RootError::ServerFailure(response.packet.header.rcode));
        }
        let key_response = self.transport.query(".", DNSResourceType::DNSKEY, root).await?;
        if key_response.packet.is_server_failure() {
            return Err(RootError::ServerFailure(key_response.packet.header.rcode));
        }
        *hops += 1;

        let root_zone = self.verify_root(&key_response.packet)?;
        keys.insert(&root_zone);

        if !response.packet.answers.is_empty() {
            let step = self.final_step(name, qtype, &response, &root_zone)?;
            return Ok(Attempt {
                step,
                chain: keys.chain().to_vec(),
                hops: *hops,
            });
        }

        if response.packet.is_negative() {
            return Ok(Attempt::done(
                ResolutionOutcome::NoAnswer,
                Some(response),
                keys,
                *hops,
            ));
        }

        // A root referral without DS is a failure of this root, not an
        // unsigned zone.
        self.validator
            .verify_answer_or_ds(&response.packet, &root_zone, DNSResourceType::DS)?;

        let state = DelegationState::from_referral(root_zone, response.packet)
            .filter(|state| !state.candidates.is_empty())
            .ok_or(RootError::NoGlue)?;

        let mut walker =
            DelegationWalker::new(self.transport.as_ref(), &self.validator, self.max_hops);
        walker.mark_visited(".").map_err(RootError::Walk)?;
        let walked = walker.walk(name, qtype, state, keys).await;
        *hops += walker.hops();

        let step = match walked {
            Ok(WalkOutcome::Answer(response)) => match keys.last() {
                Some(zone) => match self.final_step(name, qtype, &response, &zone) {
                    Ok(step) => step,
                    Err(e) => {
                        let outcome = match chain_failure(e) {
                            WalkOutcome::VerifyFail(e) => ResolutionOutcome::VerifyFail(e),
                            _ => ResolutionOutcome::NoDnssec,
                        };
                        Step::Done(outcome, Some(response))
                    }
                },
                None => Step::Done(ResolutionOutcome::UnknownError, Some(response)),
            },
            Ok(WalkOutcome::NoDnssec) => Step::Done(ResolutionOutcome::NoDnssec, None),
            Ok(WalkOutcome::NoAnswer(response)) => {
                Step::Done(ResolutionOutcome::NoAnswer, Some(response))
            }
            Ok(WalkOutcome::VerifyFail(e)) => Step::Done(ResolutionOutcome::VerifyFail(e), None),
            Err(WalkError::LoopDetected(zone)) => {
                warn!("Delegation loop at {}", zone);
                Step::Done(ResolutionOutcome::UnknownError, None)
            }
            Err(e) => return Err(RootError::Walk(e)),
        };

        Ok(Attempt {
            step,
            chain: keys.chain().to_vec(),
            hops: *hops,
        })
    }

    /// Root DNSKEY set: anchor first, then the set's own signature.
    fn verify_root(&self, key_response: &crate::dns::DNSPacket) -> Result<TrustedZone, DnsSecError> {
        let root_keys = self
            .validator
            .classifier()
            .classify(key_response, DNSResourceType::DNSKEY)?
            .rrset
            .ok_or_else(|| DnsSecError::NoDnsKey(".".to_string()))?;
        self.validator.verify_root_keys(root_keys.dnskeys())?;

        let root_zone = self.validator.verify_dnskey_self_consistency(key_response)?;
        if root_zone.owner != "." {
            return Err(DnsSecError::PubKskMismatch);
        }
        info!("Root DNSKEY set validated against trust anchor");
        Ok(root_zone)
    }

    /// Verify an answer under the keys of the zone that served it. A
    /// validation failure is returned for the caller to classify.
    fn final_step(
        &self,
        name: &str,
        qtype: DNSResourceType,
        response: &DnsResponse,
        zone: &TrustedZone,
    ) -> Result<Step, DnsSecError> {
        let has = |rtype: DNSResourceType| {
            response
                .packet
                .answers
                .iter()
                .any(|rr| rr.rtype == rtype && rr.owner() == name)
        };

        let verify_type = if has(qtype) {
            qtype
        } else if has(DNSResourceType::CNAME) {
            DNSResourceType::CNAME
        } else {
            debug!("Answer for {} holds no {} or CNAME records", name, qtype);
            return Ok(Step::Done(ResolutionOutcome::NoAnswer, Some(response.clone())));
        };

        let rrset = self
            .validator
            .verify_final_answer(&response.packet, zone, verify_type)?;

        if verify_type == qtype {
            info!("{} {} verified under {}", name, qtype, zone.owner);
            return Ok(Step::Done(
                ResolutionOutcome::Answer(rrset),
                Some(response.clone()),
            ));
        }

        Ok(match rrset.records().first().and_then(|rr| rr.alias_target()) {
            Some(target) => Step::Alias {
                target: target.to_string(),
                cnames: rrset,
            },
            None => Step::Done(ResolutionOutcome::NoAnswer, Some(response.clone())),
        })
    }
}
