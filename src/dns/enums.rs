use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    DNAME,
    OPT,
    DS,
    RRSIG,
    NSEC,
    DNSKEY,
    NSEC3,
    CAA,
    ANY,
    Unknown(u16),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CS,
    CH,
    HS,
    /// Anything else, including the payload size carried by OPT records
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            2 => DNSResourceClass::CS,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> Self {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceClass::IN => write!(f, "IN"),
            DNSResourceClass::CS => write!(f, "CS"),
            DNSResourceClass::CH => write!(f, "CH"),
            DNSResourceClass::HS => write!(f, "HS"),
            DNSResourceClass::Unknown(x) => write!(f, "CLASS{}", x),
        }
    }
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            12 => DNSResourceType::PTR,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            39 => DNSResourceType::DNAME,
            41 => DNSResourceType::OPT,
            43 => DNSResourceType::DS,
            46 => DNSResourceType::RRSIG,
            47 => DNSResourceType::NSEC,
            48 => DNSResourceType::DNSKEY,
            50 => DNSResourceType::NSEC3,
            255 => DNSResourceType::ANY,
            257 => DNSResourceType::CAA,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> Self {
        match rtype {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::DNAME => 39,
            DNSResourceType::OPT => 41,
            DNSResourceType::DS => 43,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::NSEC => 47,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::NSEC3 => 50,
            DNSResourceType::ANY => 255,
            DNSResourceType::CAA => 257,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

impl DNSResourceType {
    /// Whether the rdata of this type embeds domain names that must be
    /// decompressed on parse and lowercased in canonical form (RFC 4034 §6.2).
    pub fn has_embedded_names(&self) -> bool {
        matches!(
            self,
            DNSResourceType::NS
                | DNSResourceType::CNAME
                | DNSResourceType::SOA
                | DNSResourceType::PTR
                | DNSResourceType::MX
                | DNSResourceType::SRV
                | DNSResourceType::DNAME
                | DNSResourceType::RRSIG
        )
    }

    /// Address-bearing types the walker treats as a final answer.
    pub fn is_address(&self) -> bool {
        matches!(self, DNSResourceType::A | DNSResourceType::AAAA)
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceType::Unknown(x) => write!(f, "TYPE{}", x),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record type: {0}")]
pub struct UnknownRecordType(pub String);

impl FromStr for DNSResourceType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let rtype = match upper.as_str() {
            "A" => DNSResourceType::A,
            "NS" => DNSResourceType::NS,
            "CNAME" => DNSResourceType::CNAME,
            "SOA" => DNSResourceType::SOA,
            "PTR" => DNSResourceType::PTR,
            "MX" => DNSResourceType::MX,
            "TXT" => DNSResourceType::TXT,
            "AAAA" => DNSResourceType::AAAA,
            "SRV" => DNSResourceType::SRV,
            "DNAME" => DNSResourceType::DNAME,
            "DS" => DNSResourceType::DS,
            "RRSIG" => DNSResourceType::RRSIG,
            "NSEC" => DNSResourceType::NSEC,
            "DNSKEY" => DNSResourceType::DNSKEY,
            "NSEC3" => DNSResourceType::NSEC3,
            "CAA" => DNSResourceType::CAA,
            "ANY" => DNSResourceType::ANY,
            other => match other.strip_prefix("TYPE").map(str::parse::<u16>) {
                Some(Ok(code)) => DNSResourceType::from(code),
                _ => return Err(UnknownRecordType(s.to_string())),
            },
        };
        Ok(rtype)
    }
}
