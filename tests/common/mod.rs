//! Shared fixtures: zones signed at test time and a scripted transport.

#![allow(dead_code)] // Not every test file uses every helper

use async_trait::async_trait;
use parking_lot::Mutex;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use sigwalk::Resolver;
use sigwalk::dns::DNSPacket;
use sigwalk::dns::common::{label_count, normalize_name};
use sigwalk::dns::constants::DNSRcode;
use sigwalk::dns::enums::DNSResourceType;
use sigwalk::dns::rdata::{DnskeyRecord, DsRecord, RData, RrsigRecord};
use sigwalk::dns::resource::DNSResource;
use sigwalk::dnssec::crypto::{compute_ds, signed_data};
use sigwalk::dnssec::{DigestType, RecordSet, RingVerifier, TrustAnchor};
use sigwalk::error::TransportError;
use sigwalk::transport::{DnsResponse, Transport};

/// Clock every fixture signature is valid at.
pub const NOW: u32 = 1_700_000_000;

pub const ROOT_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const COM_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
pub const EXAMPLE_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 3);
pub const WWW_ADDR: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

pub fn addr(ip: Ipv4Addr) -> SocketAddr {
    SocketAddr::from((ip, 53))
}

/// A zone with a single Ed25519 KSK that signs everything it serves.
pub struct SignedZone {
    pub name: String,
    pub ksk: DnskeyRecord,
    pair: Ed25519KeyPair,
}

impl SignedZone {
    pub fn new(name: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let ksk = DnskeyRecord {
            flags: 257,
            protocol: 3,
            algorithm: 15,
            public_key: pair.public_key().as_ref().to_vec(),
        };
        Self {
            name: normalize_name(name),
            ksk,
            pair,
        }
    }

    /// RRSIG over `records`, which must form one RRset.
    pub fn sign(&self, records: &[DNSResource]) -> DNSResource {
        let rrset = RecordSet::from_records(records.to_vec()).unwrap().unwrap();
        let mut sig = RrsigRecord {
            type_covered: rrset.rtype(),
            algorithm: self.ksk.algorithm,
            labels: label_count(rrset.owner()) as u8,
            original_ttl: 3600,
            expiration: NOW + 86_400,
            inception: NOW - 86_400,
            key_tag: self.ksk.key_tag(),
            signer_name: self.name.clone(),
            signature: Vec::new(),
        };
        sig.signature = self.pair.sign(&signed_data(&rrset, &sig)).as_ref().to_vec();
        DNSResource::new(rrset.owner(), 3600, RData::RRSIG(sig))
    }

    /// `records` followed by their RRSIG.
    pub fn signed(&self, mut records: Vec<DNSResource>) -> Vec<DNSResource> {
        let sig = self.sign(&records);
        records.push(sig);
        records
    }

    pub fn dnskey_response(&self) -> DNSPacket {
        let key = DNSResource::new(&self.name, 3600, RData::DNSKEY(self.ksk.clone()));
        response(self.signed(vec![key]), vec![], vec![])
    }

    pub fn ds(&self) -> DsRecord {
        compute_ds(&self.name, &self.ksk, DigestType::Sha256).unwrap()
    }
}

pub fn response(
    answers: Vec<DNSResource>,
    authorities: Vec<DNSResource>,
    resources: Vec<DNSResource>,
) -> DNSPacket {
    let mut packet = DNSPacket {
        answers,
        authorities,
        resources,
        ..Default::default()
    };
    packet.header.qr = true;
    packet
}

/// Signed delegation from `parent` to `child` with one glue address per
/// entry of `glue`.
pub fn referral_with_glue(parent: &SignedZone, child: &SignedZone, glue: &[Ipv4Addr]) -> DNSPacket {
    let ds = DNSResource::new(&child.name, 3600, RData::DS(child.ds()));
    let mut authorities: Vec<DNSResource> = (0..glue.len())
        .map(|i| {
            DNSResource::new(
                &child.name,
                3600,
                RData::NS(format!("ns{}.{}", i + 1, child.name)),
            )
        })
        .collect();
    authorities.extend(parent.signed(vec![ds]));

    let additional = glue
        .iter()
        .enumerate()
        .map(|(i, ip)| DNSResource::new(&format!("ns{}.{}", i + 1, child.name), 3600, RData::A(*ip)))
        .collect();

    response(vec![], authorities, additional)
}

pub fn referral(parent: &SignedZone, child: &SignedZone, glue: Ipv4Addr) -> DNSPacket {
    referral_with_glue(parent, child, &[glue])
}

/// Delegation carrying NS and glue but no DS.
pub fn unsigned_referral(child: &str, glue: Ipv4Addr) -> DNSPacket {
    let ns_name = format!("ns1.{}", normalize_name(child));
    response(
        vec![],
        vec![DNSResource::new(child, 3600, RData::NS(ns_name.clone()))],
        vec![DNSResource::new(&ns_name, 3600, RData::A(glue))],
    )
}

pub fn signed_answer(zone: &SignedZone, records: Vec<DNSResource>) -> DNSPacket {
    response(zone.signed(records), vec![], vec![])
}

pub fn a_record(name: &str, ip: Ipv4Addr) -> DNSResource {
    DNSResource::new(name, 300, RData::A(ip))
}

pub fn cname(name: &str, target: &str) -> DNSResource {
    DNSResource::new(name, 300, RData::CNAME(target.to_string()))
}

pub fn nxdomain(zone: &SignedZone) -> DNSPacket {
    let soa = DNSResource::new(
        &zone.name,
        300,
        RData::SOA {
            mname: format!("ns1.{}", zone.name),
            rname: format!("hostmaster.{}", zone.name),
            serial: 2024010101,
            refresh: 7200,
            retry: 3600,
            expire: 1_209_600,
            minimum: 300,
        },
    );
    let mut packet = response(vec![], zone.signed(vec![soa]), vec![]);
    packet.header.rcode = DNSRcode::NXDOMAIN;
    packet
}

type QueryKey = (SocketAddr, String, DNSResourceType);

/// In-memory transport answering from a script; anything unscripted times
/// out.
#[derive(Default)]
pub struct MockTransport {
    script: HashMap<QueryKey, Result<DNSPacket, TransportError>>,
    log: Mutex<Vec<QueryKey>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&mut self, server: Ipv4Addr, name: &str, qtype: DNSResourceType, packet: DNSPacket) {
        self.script
            .insert((addr(server), normalize_name(name), qtype), Ok(packet));
    }

    pub fn fail(&mut self, server: Ipv4Addr, name: &str, qtype: DNSResourceType, err: TransportError) {
        self.script
            .insert((addr(server), normalize_name(name), qtype), Err(err));
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<QueryKey> {
        self.log.lock().clone()
    }

    pub fn queried(&self, server: Ipv4Addr) -> bool {
        self.log.lock().iter().any(|(s, _, _)| *s == addr(server))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn query(
        &self,
        name: &str,
        qtype: DNSResourceType,
        server: SocketAddr,
    ) -> Result<DnsResponse, TransportError> {
        let key = (server, normalize_name(name), qtype);
        self.log.lock().push(key.clone());

        match self.script.get(&key) {
            Some(Ok(packet)) => {
                let size = packet.serialize().map(|b| b.len()).unwrap_or_default();
                Ok(DnsResponse {
                    packet: packet.clone(),
                    size,
                })
            }
            Some(Err(e)) => Err(e.clone()),
            None => Err(TransportError::Timeout(server)),
        }
    }
}

/// root → com → example.com, every zone signed and every delegation bound.
pub struct World {
    pub root: SignedZone,
    pub com: SignedZone,
    pub example: SignedZone,
    pub transport: MockTransport,
}

impl World {
    pub fn new() -> Self {
        let mut world = Self {
            root: SignedZone::new("."),
            com: SignedZone::new("com."),
            example: SignedZone::new("example.com."),
            transport: MockTransport::new(),
        };
        world.serve_keys();
        world.delegate("www.example.com.", DNSResourceType::A);
        let answer = signed_answer(&world.example, vec![a_record("www.example.com.", WWW_ADDR)]);
        world
            .transport
            .respond(EXAMPLE_IP, "www.example.com.", DNSResourceType::A, answer);
        world
    }

    fn serve_keys(&mut self) {
        self.transport
            .respond(ROOT_IP, ".", DNSResourceType::DNSKEY, self.root.dnskey_response());
        self.transport
            .respond(COM_IP, "com.", DNSResourceType::DNSKEY, self.com.dnskey_response());
        self.transport.respond(
            EXAMPLE_IP,
            "example.com.",
            DNSResourceType::DNSKEY,
            self.example.dnskey_response(),
        );
    }

    /// Script root and com referrals for (`name`, `qtype`).
    pub fn delegate(&mut self, name: &str, qtype: DNSResourceType) {
        let to_com = referral(&self.root, &self.com, COM_IP);
        let to_example = referral(&self.com, &self.example, EXAMPLE_IP);
        self.transport.respond(ROOT_IP, name, qtype, to_com);
        self.transport.respond(COM_IP, name, qtype, to_example);
    }

    pub fn anchor(&self) -> TrustAnchor {
        TrustAnchor::new(self.root.ksk.clone(), vec![addr(ROOT_IP)])
    }

    /// Resolver over this world's transport; the transport handle stays
    /// available for inspecting the query log.
    pub fn into_resolver(self) -> (Resolver, Arc<MockTransport>) {
        let anchor = self.anchor();
        let transport = Arc::new(self.transport);
        let resolver = Resolver::new(
            transport.clone(),
            Arc::new(RingVerifier::at_time(NOW)),
            anchor,
        );
        (resolver, transport)
    }
}
