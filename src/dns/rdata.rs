//! Typed record data.
//!
//! Names embedded in rdata are decompressed while parsing, so `to_wire`
//! always produces the uncompressed form that signatures are computed over.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::ParseError;
use super::common::{labels_to_fqdn, read_name_at, write_name};
use super::enums::DNSResourceType;
use crate::dnssec::calculate_key_tag;

/// DNSKEY flags value of a zone key with the SEP bit set.
pub const KSK_FLAGS: u16 = 257;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(String),
    CNAME(String),
    PTR(String),
    DNAME(String),
    MX {
        preference: u16,
        exchange: String,
    },
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    TXT(Vec<Vec<u8>>),
    DS(DsRecord),
    DNSKEY(DnskeyRecord),
    RRSIG(RrsigRecord),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnskeyRecord {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DsRecord {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RrsigRecord {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer_name: String,
    pub signature: Vec<u8>,
}

/// Bounds-checked reads over an rdata slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or(ParseError::InvalidRdata("truncated rdata"))?;
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Read a name; pointers resolve against the full packet at
    /// `rdata_offset`.
    fn name(&mut self, packet: &[u8], rdata_offset: usize) -> Result<String, ParseError> {
        let (labels, consumed) = read_name_at(packet, rdata_offset + self.pos)?;
        if self.pos + consumed > self.data.len() {
            return Err(ParseError::InvalidRdata("name overruns rdata"));
        }
        self.pos += consumed;
        Ok(labels_to_fqdn(&labels))
    }

    fn finish(&self) -> Result<(), ParseError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(ParseError::InvalidRdata("trailing bytes in rdata"))
        }
    }
}

impl RData {
    /// Parse rdata of `rtype`. `packet` and `rdata_offset` locate the rdata in
    /// the enclosing message for compression pointers; pass the rdata itself
    /// and offset 0 for standalone data. Returns `None` for types kept raw.
    pub fn parse(
        rtype: DNSResourceType,
        rdata: &[u8],
        packet: &[u8],
        rdata_offset: usize,
    ) -> Result<Option<Self>, ParseError> {
        let mut c = Cursor::new(rdata);
        let parsed = match rtype {
            DNSResourceType::A => {
                let b = c.take(4)?;
                RData::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            DNSResourceType::AAAA => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(c.take(16)?);
                RData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::NS => RData::NS(c.name(packet, rdata_offset)?),
            DNSResourceType::CNAME => RData::CNAME(c.name(packet, rdata_offset)?),
            DNSResourceType::PTR => RData::PTR(c.name(packet, rdata_offset)?),
            DNSResourceType::DNAME => RData::DNAME(c.name(packet, rdata_offset)?),
            DNSResourceType::MX => RData::MX {
                preference: c.u16()?,
                exchange: c.name(packet, rdata_offset)?,
            },
            DNSResourceType::SOA => RData::SOA {
                mname: c.name(packet, rdata_offset)?,
                rname: c.name(packet, rdata_offset)?,
                serial: c.u32()?,
                refresh: c.u32()?,
                retry: c.u32()?,
                expire: c.u32()?,
                minimum: c.u32()?,
            },
            DNSResourceType::SRV => RData::SRV {
                priority: c.u16()?,
                weight: c.u16()?,
                port: c.u16()?,
                target: c.name(packet, rdata_offset)?,
            },
            DNSResourceType::TXT => {
                let mut strings = Vec::new();
                while c.pos < rdata.len() {
                    let len = c.u8()? as usize;
                    strings.push(c.take(len)?.to_vec());
                }
                RData::TXT(strings)
            }
            DNSResourceType::DS => RData::DS(DsRecord {
                key_tag: c.u16()?,
                algorithm: c.u8()?,
                digest_type: c.u8()?,
                digest: c.rest().to_vec(),
            }),
            DNSResourceType::DNSKEY => RData::DNSKEY(DnskeyRecord {
                flags: c.u16()?,
                protocol: c.u8()?,
                algorithm: c.u8()?,
                public_key: c.rest().to_vec(),
            }),
            DNSResourceType::RRSIG => RData::RRSIG(RrsigRecord {
                type_covered: c.u16()?.into(),
                algorithm: c.u8()?,
                labels: c.u8()?,
                original_ttl: c.u32()?,
                expiration: c.u32()?,
                inception: c.u32()?,
                key_tag: c.u16()?,
                signer_name: c.name(packet, rdata_offset)?,
                signature: c.rest().to_vec(),
            }),
            _ => return Ok(None),
        };
        c.finish()?;
        Ok(Some(parsed))
    }

    /// Uncompressed wire form. `canonical` lowercases embedded names
    /// (RFC 4034 §6.2).
    pub fn to_wire(&self, canonical: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            RData::A(ip) => buf.extend_from_slice(&ip.octets()),
            RData::AAAA(ip) => buf.extend_from_slice(&ip.octets()),
            RData::NS(name) | RData::CNAME(name) | RData::PTR(name) | RData::DNAME(name) => {
                write_name(&mut buf, name, canonical)
            }
            RData::MX {
                preference,
                exchange,
            } => {
                buf.extend_from_slice(&preference.to_be_bytes());
                write_name(&mut buf, exchange, canonical);
            }
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                write_name(&mut buf, mname, canonical);
                write_name(&mut buf, rname, canonical);
                for v in [serial, refresh, retry, expire, minimum] {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
            }
            RData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                buf.extend_from_slice(&priority.to_be_bytes());
                buf.extend_from_slice(&weight.to_be_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
                write_name(&mut buf, target, canonical);
            }
            RData::TXT(strings) => {
                for s in strings {
                    buf.push(s.len() as u8);
                    buf.extend_from_slice(s);
                }
            }
            RData::DS(ds) => ds.write(&mut buf),
            RData::DNSKEY(key) => key.write(&mut buf),
            RData::RRSIG(sig) => {
                sig.write_header(&mut buf, canonical);
                buf.extend_from_slice(&sig.signature);
            }
        }
        buf
    }
}

impl DnskeyRecord {
    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    /// Key-signing key: flags exactly 257 (zone key + SEP).
    pub fn is_ksk(&self) -> bool {
        self.flags == KSK_FLAGS
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.push(self.protocol);
        buf.push(self.algorithm);
        buf.extend_from_slice(&self.public_key);
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.public_key.len());
        self.write(&mut buf);
        buf
    }
}

impl DsRecord {
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.key_tag.to_be_bytes());
        buf.push(self.algorithm);
        buf.push(self.digest_type);
        buf.extend_from_slice(&self.digest);
    }
}

impl RrsigRecord {
    /// RRSIG rdata without the signature field, as prefixed to the signed
    /// data (RFC 4034 §3.1.8.1).
    pub fn write_header(&self, buf: &mut Vec<u8>, canonical: bool) {
        buf.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
        buf.push(self.algorithm);
        buf.push(self.labels);
        buf.extend_from_slice(&self.original_ttl.to_be_bytes());
        buf.extend_from_slice(&self.expiration.to_be_bytes());
        buf.extend_from_slice(&self.inception.to_be_bytes());
        buf.extend_from_slice(&self.key_tag.to_be_bytes());
        write_name(buf, &self.signer_name, canonical);
    }
}

impl fmt::Display for DnskeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.flags,
            self.protocol,
            self.algorithm,
            BASE64.encode(&self.public_key)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid DNSKEY presentation: {0}")]
pub struct InvalidDnskeyText(pub String);

impl FromStr for DnskeyRecord {
    type Err = InvalidDnskeyText;

    /// Parses `flags protocol algorithm base64-key`; the key may be split
    /// over several whitespace-separated chunks.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidDnskeyText(s.to_string());
        let mut fields = s.split_whitespace();
        let flags = fields.next().and_then(|f| f.parse().ok()).ok_or_else(err)?;
        let protocol = fields.next().and_then(|f| f.parse().ok()).ok_or_else(err)?;
        let algorithm = fields.next().and_then(|f| f.parse().ok()).ok_or_else(err)?;
        let encoded: String = fields.collect();
        if encoded.is_empty() {
            return Err(err());
        }
        let public_key = BASE64.decode(encoded.as_bytes()).map_err(|_| err())?;
        Ok(DnskeyRecord {
            flags,
            protocol,
            algorithm,
            public_key,
        })
    }
}

impl fmt::Display for DsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.key_tag,
            self.algorithm,
            self.digest_type,
            hex::encode_upper(&self.digest)
        )
    }
}

impl fmt::Display for RrsigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {}",
            self.type_covered,
            self.algorithm,
            self.labels,
            self.original_ttl,
            self.expiration,
            self.inception,
            self.key_tag,
            self.signer_name,
            BASE64.encode(&self.signature)
        )
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(ip) => write!(f, "{}", ip),
            RData::AAAA(ip) => write!(f, "{}", ip),
            RData::NS(name) | RData::CNAME(name) | RData::PTR(name) | RData::DNAME(name) => {
                write!(f, "{}", name)
            }
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            RData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            RData::TXT(strings) => {
                let quoted: Vec<String> = strings
                    .iter()
                    .map(|s| format!("\"{}\"", String::from_utf8_lossy(s)))
                    .collect();
                write!(f, "{}", quoted.join(" "))
            }
            RData::DS(ds) => write!(f, "{}", ds),
            RData::DNSKEY(key) => write!(f, "{}", key),
            RData::RRSIG(sig) => write!(f, "{}", sig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_KSK_TEXT: &str = "257 3 8 AwEAAaz/tAm8yTn4Mfeh5eyI96WSVexTBAvkMgJzkKTOiW1vkIbzxeF3+/4RgWOq7HrxRixHlFlExOLAJr5emLvN7SWXgnLh4+B5xQlNVz8Og8kvArMtNROxVQuCaSnIDdD5LKyWbRd2n9WGe2R8PzgCmr3EgVLrjyBxWezF0jLHwVN8efS3rCj/EWgvIWgb9tarpVUDK/b58Da+sqqls3eNbuv7pr+eoZG+SrDK6nWeL3c6H5Apxz7LjVc1uTIdsIXxuOLYA4/ilBmSVIzuDWfdRUfhHdY6+cn8HFRm+2hM8AnXGXws9555KrUB5qihylGa8subX2Nn6UwNR1AkUTV74bU=";

    #[test]
    fn test_dnskey_presentation_roundtrip() {
        let key: DnskeyRecord = ROOT_KSK_TEXT.parse().unwrap();
        assert_eq!(key.flags, 257);
        assert_eq!(key.protocol, 3);
        assert_eq!(key.algorithm, 8);
        assert!(key.is_ksk());
        assert_eq!(key.key_tag(), 20326);
        assert_eq!(key.to_string(), ROOT_KSK_TEXT);
    }

    #[test]
    fn test_dnskey_text_errors() {
        assert!("257 3".parse::<DnskeyRecord>().is_err());
        assert!("257 3 8 !!!notbase64".parse::<DnskeyRecord>().is_err());
        assert!("x 3 8 AwEAAQ==".parse::<DnskeyRecord>().is_err());
    }

    #[test]
    fn test_parse_mx_with_compression() {
        // Packet: "example.com" at 0, MX rdata at 13 pointing back at it
        let mut packet = Vec::new();
        write_name(&mut packet, "example.com.", false);
        let rdata_offset = packet.len();
        packet.extend_from_slice(&[0x00, 0x0A, 4, b'm', b'a', b'i', b'l', 0xC0, 0x00]);
        let rdata = &packet[rdata_offset..];

        let parsed = RData::parse(DNSResourceType::MX, rdata, &packet, rdata_offset)
            .unwrap()
            .unwrap();
        assert_eq!(
            parsed,
            RData::MX {
                preference: 10,
                exchange: "mail.example.com.".to_string()
            }
        );

        let mut expected = vec![0x00, 0x0A];
        write_name(&mut expected, "mail.example.com.", false);
        assert_eq!(parsed.to_wire(false), expected);
    }

    #[test]
    fn test_canonical_lowercases_names() {
        let ns = RData::NS("NS1.Example.COM.".to_string());
        assert_eq!(ns.to_wire(true), b"\x03ns1\x07example\x03com\x00");
        assert_eq!(ns.to_wire(false), b"\x03NS1\x07Example\x03COM\x00");
    }

    #[test]
    fn test_rrsig_parse() {
        let sig = RrsigRecord {
            type_covered: DNSResourceType::A,
            algorithm: 15,
            labels: 2,
            original_ttl: 300,
            expiration: 2_000_000_000,
            inception: 1_000_000_000,
            key_tag: 4242,
            signer_name: "example.com.".to_string(),
            signature: vec![0xAB; 64],
        };
        let wire = RData::RRSIG(sig.clone()).to_wire(false);
        let parsed = RData::parse(DNSResourceType::RRSIG, &wire, &wire, 0)
            .unwrap()
            .unwrap();
        assert_eq!(parsed, RData::RRSIG(sig));
    }

    #[test]
    fn test_truncated_a_record() {
        assert!(RData::parse(DNSResourceType::A, &[1, 2, 3], &[1, 2, 3], 0).is_err());
        assert!(RData::parse(DNSResourceType::A, &[1, 2, 3, 4, 5], &[1, 2, 3, 4, 5], 0).is_err());
    }

    #[test]
    fn test_unknown_type_kept_raw() {
        let parsed = RData::parse(DNSResourceType::Unknown(65), &[1, 2], &[1, 2], 0).unwrap();
        assert!(parsed.is_none());
    }
}
