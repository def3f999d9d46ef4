pub mod common;
pub mod constants;
pub mod edns;
pub mod enums;
pub mod header;
pub mod question;
pub mod rdata;
pub mod resource;

use bitstream_io::{BigEndian, BitReader, BitWrite, BitWriter};
use common::{PacketComponent, fqdn_to_labels};
use constants::DNSRcode;
use edns::EdnsOpt;
use enums::{DNSResourceClass, DNSResourceType};
use header::DNSHeader;
use question::DNSQuestion;
use rdata::RData;
use resource::DNSResource;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// EDNS0 OPT record if present (extracted from additional records)
    pub edns: Option<EdnsOpt>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid DNS header")]
    InvalidHeader,
    #[error("Invalid DNS label")]
    InvalidLabel,
    #[error("DNS name too long")]
    NameTooLong,
    #[error("Compression pointer loop")]
    CompressionLoop,
    #[error("Invalid rdata: {0}")]
    InvalidRdata(&'static str),
    #[error("Trailing bytes after last record")]
    TrailingData,
    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl DNSPacket {
    /// Build an iterative query: RD clear, CD set, EDNS0 with the DO bit.
    pub fn query(id: u16, name: &str, qtype: DNSResourceType, payload_size: u16) -> Self {
        let mut packet = DNSPacket {
            header: DNSHeader {
                id,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![DNSQuestion {
                labels: fqdn_to_labels(name),
                qtype,
                qclass: DNSResourceClass::IN,
            }],
            ..Default::default()
        };
        packet.header.set_cd(true);
        packet.add_edns(payload_size, true);
        packet
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut offset = 0;
        let mut packet = DNSPacket::default();
        packet.header.read_with_buffer(&mut reader, buf, &mut offset)?;

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read_with_buffer(&mut reader, buf, &mut offset)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer.read_with_buffer(&mut reader, buf, &mut offset)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority.read_with_buffer(&mut reader, buf, &mut offset)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource.read_with_buffer(&mut reader, buf, &mut offset)?;

            if resource.rtype == DNSResourceType::OPT && resource.labels.iter().all(|l| l.is_empty())
            {
                let edns = EdnsOpt::parse_from_resource(
                    resource.rclass.into(),
                    resource.ttl,
                    &resource.rdata,
                )?;
                trace!(
                    "EDNS0: payload={}, do={}",
                    edns.udp_payload_size,
                    edns.do_flag()
                );
                packet.edns = Some(edns);
                continue;
            }

            packet.resources.push(resource);
        }

        if offset != buf.len() {
            return Err(ParseError::TrailingData);
        }

        debug!(
            "Parsed DNS packet id={} rcode={} answers={} authorities={} additional={}",
            packet.header.id,
            DNSRcode::name(packet.header.rcode),
            packet.answers.len(),
            packet.authorities.len(),
            packet.resources.len()
        );
        Ok(packet)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16 + self.edns.is_some() as u16;
        header.write(&mut writer)?;

        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.resources)
        {
            record.write(&mut writer)?;
        }

        if let Some(edns) = &self.edns {
            let (udp_payload_size, ttl, rdata) = edns.to_resource_format();
            writer.write_var::<u8>(8, 0)?;
            writer.write_var::<u16>(16, DNSResourceType::OPT.into())?;
            writer.write_var::<u16>(16, udp_payload_size)?;
            writer.write_var::<u32>(32, ttl)?;
            writer.write_var::<u16>(16, rdata.len() as u16)?;
            writer.write_bytes(&rdata)?;
        }

        Ok(buf)
    }

    pub fn add_edns(&mut self, payload_size: u16, do_flag: bool) {
        let mut edns = EdnsOpt::with_payload_size(payload_size);
        edns.set_do_flag(do_flag);
        self.edns = Some(edns);
    }

    /// Check if DNSSEC is requested (DO flag)
    pub fn dnssec_requested(&self) -> bool {
        self.edns.as_ref().map(|edns| edns.do_flag()).unwrap_or(false)
    }

    /// Authoritative negative answer: NXDOMAIN, or NODATA signalled by an
    /// SOA in the authority section with nothing in the answer section.
    pub fn is_negative(&self) -> bool {
        self.header.rcode == DNSRcode::NXDOMAIN
            || (self.answers.is_empty()
                && self
                    .authorities
                    .iter()
                    .any(|rr| rr.rtype == DNSResourceType::SOA))
    }

    /// Rcodes other than NOERROR and NXDOMAIN mean the server could not
    /// help; the caller moves on to another server.
    pub fn is_server_failure(&self) -> bool {
        !matches!(self.header.rcode, DNSRcode::NOERROR | DNSRcode::NXDOMAIN)
    }

    /// Zone a referral points at: owner of the first NS record in the
    /// authority section.
    pub fn referral_zone(&self) -> Option<String> {
        self.authorities
            .iter()
            .find(|rr| rr.rtype == DNSResourceType::NS)
            .map(|rr| rr.owner())
    }

    /// IPv4 glue from the additional section, in the order received.
    pub fn glue_addresses(&self) -> Vec<Ipv4Addr> {
        self.resources
            .iter()
            .filter_map(|rr| match &rr.parsed_rdata {
                Some(RData::A(ip)) => Some(*ip),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_query_roundtrip() {
        let query = DNSPacket::query(0x4242, "example.com.", DNSResourceType::DNSKEY, 1232);
        let wire = query.serialize().unwrap();
        let parsed = DNSPacket::parse(&wire).unwrap();

        assert_eq!(parsed.header.id, 0x4242);
        assert!(!parsed.header.rd);
        assert!(parsed.header.cd());
        assert!(parsed.dnssec_requested());
        assert_eq!(parsed.questions[0].name(), "example.com.");
        assert_eq!(parsed.questions[0].qtype, DNSResourceType::DNSKEY);
        assert_eq!(parsed.edns.as_ref().unwrap().payload_size(), 1232);
    }

    #[test]
    fn test_parse_compressed_response() {
        // Hand-assembled response for example.com A with a compressed answer
        let mut wire = vec![
            0x12, 0x34, 0x84, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        common::write_name(&mut wire, "example.com.", false);
        wire.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        wire.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
        wire.extend_from_slice(&300u32.to_be_bytes());
        wire.extend_from_slice(&[0x00, 0x04, 93, 184, 216, 34]);

        let packet = DNSPacket::parse(&wire).unwrap();
        assert!(packet.header.aa);
        assert_eq!(packet.answers.len(), 1);
        assert_eq!(packet.answers[0].name(), "example.com.");
        assert_eq!(
            packet.answers[0].parsed_rdata,
            Some(RData::A(Ipv4Addr::new(93, 184, 216, 34)))
        );
    }

    #[test]
    fn test_truncated_packet_rejected() {
        let query = DNSPacket::query(1, "example.com.", DNSResourceType::A, 4096);
        let wire = query.serialize().unwrap();
        assert!(DNSPacket::parse(&wire[..wire.len() - 3]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let query = DNSPacket::query(1, "example.com.", DNSResourceType::A, 4096);
        let mut wire = query.serialize().unwrap();
        wire.push(0);
        assert_eq!(DNSPacket::parse(&wire), Err(ParseError::TrailingData));
    }

    #[test]
    fn test_negative_and_failure_detection() {
        let mut packet = DNSPacket::default();
        assert!(!packet.is_negative());
        packet.header.rcode = DNSRcode::NXDOMAIN;
        assert!(packet.is_negative());
        assert!(!packet.is_server_failure());
        packet.header.rcode = DNSRcode::SERVFAIL;
        assert!(packet.is_server_failure());
    }
}
