use super::ParseError;

/// EDNS0 OPT pseudo-record (RFC 6891), reduced to what a DNSSEC-aware stub
/// needs: payload size and the DO flag. Options are skipped on parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOpt {
    /// UDP payload size that can be handled by the requestor
    pub udp_payload_size: u16,
    /// Extended RCODE (high 8 bits)
    pub extended_rcode: u8,
    /// EDNS version (currently 0)
    pub version: u8,
    /// EDNS flags (16 bits)
    pub flags: u16,
}

impl Default for EdnsOpt {
    fn default() -> Self {
        Self::new()
    }
}

impl EdnsOpt {
    const DO_FLAG: u16 = 0x8000;

    pub fn new() -> Self {
        Self {
            udp_payload_size: 4096,
            extended_rcode: 0,
            version: 0,
            flags: 0,
        }
    }

    pub fn with_payload_size(payload_size: u16) -> Self {
        Self {
            udp_payload_size: payload_size,
            ..Self::new()
        }
    }

    /// Check if DNSSEC OK (DO) flag is set
    pub fn do_flag(&self) -> bool {
        (self.flags & Self::DO_FLAG) != 0
    }

    pub fn set_do_flag(&mut self, value: bool) {
        if value {
            self.flags |= Self::DO_FLAG;
        } else {
            self.flags &= !Self::DO_FLAG;
        }
    }

    pub fn payload_size(&self) -> u16 {
        self.udp_payload_size
    }

    /// Parse from the OPT record fields: CLASS carries the payload size and
    /// TTL packs extended RCODE, version and flags.
    pub fn parse_from_resource(class: u16, ttl: u32, rdata: &[u8]) -> Result<Self, ParseError> {
        let mut pos = 0;
        while pos < rdata.len() {
            if pos + 4 > rdata.len() {
                return Err(ParseError::InvalidRdata("truncated EDNS option"));
            }
            let option_length = u16::from_be_bytes([rdata[pos + 2], rdata[pos + 3]]) as usize;
            pos += 4 + option_length;
        }
        if pos > rdata.len() {
            return Err(ParseError::InvalidRdata("EDNS option overruns rdata"));
        }

        Ok(EdnsOpt {
            udp_payload_size: class,
            extended_rcode: ((ttl >> 24) & 0xFF) as u8,
            version: ((ttl >> 16) & 0xFF) as u8,
            flags: (ttl & 0xFFFF) as u16,
        })
    }

    /// (class, ttl, rdata) for writing the OPT record.
    pub fn to_resource_format(&self) -> (u16, u32, Vec<u8>) {
        let ttl = ((self.extended_rcode as u32) << 24)
            | ((self.version as u32) << 16)
            | (self.flags as u32);
        (self.udp_payload_size, ttl, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_flag() {
        let mut opt = EdnsOpt::new();
        assert!(!opt.do_flag());

        opt.set_do_flag(true);
        assert!(opt.do_flag());
        assert_eq!(opt.flags & 0x8000, 0x8000);

        opt.set_do_flag(false);
        assert!(!opt.do_flag());
    }

    #[test]
    fn test_resource_format() {
        let mut opt = EdnsOpt::with_payload_size(1232);
        opt.set_do_flag(true);

        let (class, ttl, rdata) = opt.to_resource_format();
        assert_eq!(class, 1232);
        assert_eq!(ttl, 0x8000);
        assert!(rdata.is_empty());

        let parsed = EdnsOpt::parse_from_resource(class, ttl, &rdata).unwrap();
        assert_eq!(parsed, opt);
    }

    #[test]
    fn test_options_skipped_but_checked() {
        // NSID option with 3 bytes of data
        let rdata = [0x00, 0x03, 0x00, 0x03, 1, 2, 3];
        assert!(EdnsOpt::parse_from_resource(4096, 0, &rdata).is_ok());
        assert!(EdnsOpt::parse_from_resource(4096, 0, &rdata[..5]).is_err());
    }
}
