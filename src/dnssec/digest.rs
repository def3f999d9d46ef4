use ring::digest;
use std::fmt;

use super::DnsSecError;

/// DS digest types (RFC 4034, 4509, 6605)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    Sha1 = 1,
    Sha256 = 2,
    /// GOST R 34.11-94 (RFC 5933), recognised but not computed
    Gost94 = 3,
    Sha384 = 4,
}

impl DigestType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Gost94),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Gost94)
    }

    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 | Self::Gost94 => 32,
            Self::Sha384 => 48,
        }
    }

    fn ring_algorithm(&self) -> Option<&'static digest::Algorithm> {
        match self {
            Self::Sha1 => Some(&digest::SHA1_FOR_LEGACY_USE_ONLY),
            Self::Sha256 => Some(&digest::SHA256),
            Self::Sha384 => Some(&digest::SHA384),
            Self::Gost94 => None,
        }
    }

    /// Digest over the concatenation of `parts`.
    pub fn digest(&self, parts: &[&[u8]]) -> Result<Vec<u8>, DnsSecError> {
        let algorithm = self
            .ring_algorithm()
            .ok_or(DnsSecError::UnsupportedDigestType(self.to_u8()))?;
        let mut ctx = digest::Context::new(algorithm);
        for part in parts {
            ctx.update(part);
        }
        Ok(ctx.finish().as_ref().to_vec())
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Gost94 => write!(f, "GOST94"),
            Self::Sha384 => write!(f, "SHA384"),
        }
    }
}
