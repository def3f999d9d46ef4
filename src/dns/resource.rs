use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};
use std::fmt;

use super::{
    ParseError,
    common::{PacketComponent, fqdn_to_labels, labels_to_fqdn, normalize_name},
    enums::{DNSResourceClass, DNSResourceType},
    rdata::{DnskeyRecord, DsRecord, RData, RrsigRecord},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdlength: u16,
    /// Uncompressed rdata
    pub rdata: Vec<u8>,
    pub parsed_rdata: Option<RData>,
}

impl DNSResource {
    /// Build a record from typed data; used when composing messages.
    pub fn new(name: &str, ttl: u32, data: RData) -> Self {
        let rtype = data.rtype();
        let rdata = data.to_wire(false);
        Self {
            labels: fqdn_to_labels(name),
            rtype,
            rclass: DNSResourceClass::IN,
            ttl,
            rdlength: rdata.len() as u16,
            rdata,
            parsed_rdata: Some(data),
        }
    }

    /// Owner name as written on the wire, fully qualified.
    pub fn name(&self) -> String {
        labels_to_fqdn(&self.labels)
    }

    /// Owner name lowercased for comparisons.
    pub fn owner(&self) -> String {
        normalize_name(&self.name())
    }

    /// Rdata in canonical form for signing and digest input.
    pub fn canonical_rdata(&self) -> Vec<u8> {
        match &self.parsed_rdata {
            Some(data) if self.rtype.has_embedded_names() => data.to_wire(true),
            _ => self.rdata.clone(),
        }
    }

    pub fn as_dnskey(&self) -> Option<&DnskeyRecord> {
        match &self.parsed_rdata {
            Some(RData::DNSKEY(key)) => Some(key),
            _ => None,
        }
    }

    pub fn as_ds(&self) -> Option<&DsRecord> {
        match &self.parsed_rdata {
            Some(RData::DS(ds)) => Some(ds),
            _ => None,
        }
    }

    pub fn as_rrsig(&self) -> Option<&RrsigRecord> {
        match &self.parsed_rdata {
            Some(RData::RRSIG(sig)) => Some(sig),
            _ => None,
        }
    }

    /// Target of a CNAME record.
    pub fn alias_target(&self) -> Option<&str> {
        match &self.parsed_rdata {
            Some(RData::CNAME(target)) => Some(target),
            _ => None,
        }
    }
}

impl RData {
    pub fn rtype(&self) -> DNSResourceType {
        match self {
            RData::A(_) => DNSResourceType::A,
            RData::AAAA(_) => DNSResourceType::AAAA,
            RData::NS(_) => DNSResourceType::NS,
            RData::CNAME(_) => DNSResourceType::CNAME,
            RData::PTR(_) => DNSResourceType::PTR,
            RData::DNAME(_) => DNSResourceType::DNAME,
            RData::MX { .. } => DNSResourceType::MX,
            RData::SOA { .. } => DNSResourceType::SOA,
            RData::SRV { .. } => DNSResourceType::SRV,
            RData::TXT(_) => DNSResourceType::TXT,
            RData::DS(_) => DNSResourceType::DS,
            RData::DNSKEY(_) => DNSResourceType::DNSKEY,
            RData::RRSIG(_) => DNSResourceType::RRSIG,
        }
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, self.rdata.len() as u16)?;
        writer.write_bytes(&self.rdata)?;
        Ok(())
    }

    fn read_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
        offset: &mut usize,
    ) -> Result<(), ParseError> {
        self.labels = self.read_labels_with_buffer(reader, packet_buf, offset)?;
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        self.rdlength = reader.read_var::<u16>(16)?;
        *offset += 10;

        let rdata_offset = *offset;
        let mut buf = vec![0_u8; self.rdlength as usize];
        reader.read_bytes(&mut buf)?;
        *offset += buf.len();

        self.parsed_rdata = RData::parse(self.rtype, &buf, packet_buf, rdata_offset)?;
        self.rdata = match &self.parsed_rdata {
            Some(data) if self.rtype.has_embedded_names() => data.to_wire(false),
            _ => buf,
        };
        self.rdlength = self.rdata.len() as u16;

        Ok(())
    }
}

impl fmt::Display for DNSResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {} ", self.name(), self.ttl, self.rclass, self.rtype)?;
        match &self.parsed_rdata {
            Some(data) => write!(f, "{}", data),
            None => write!(f, "\\# {} {}", self.rdata.len(), hex::encode(&self.rdata)),
        }
    }
}
