/// DNS Response Code constants from RFC 1035 and subsequent RFCs
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u8 = 0; // No error
    pub const FORMERR: u8 = 1; // Format error
    pub const SERVFAIL: u8 = 2; // Server failure
    pub const NXDOMAIN: u8 = 3; // Name error
    pub const NOTIMP: u8 = 4; // Not implemented
    pub const REFUSED: u8 = 5; // Query refused

    pub fn name(rcode: u8) -> &'static str {
        match rcode {
            Self::NOERROR => "NOERROR",
            Self::FORMERR => "FORMERR",
            Self::SERVFAIL => "SERVFAIL",
            Self::NXDOMAIN => "NXDOMAIN",
            Self::NOTIMP => "NOTIMP",
            Self::REFUSED => "REFUSED",
            _ => "RCODE?",
        }
    }
}

/// Default EDNS0 payload size advertised on queries.
pub const DEFAULT_UDP_PAYLOAD_SIZE: u16 = 4096;

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;
