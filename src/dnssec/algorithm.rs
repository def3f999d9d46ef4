use ring::signature::{self, RsaParameters, RsaPublicKeyComponents, UnparsedPublicKey};
use std::fmt;

use super::DnsSecError;

/// DNSSEC Algorithm numbers (RFC 4034, 5155, 5702, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

impl DnsSecAlgorithm {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            3 => Some(Self::DSA),
            5 => Some(Self::RsaSha1),
            6 => Some(Self::DsaNsec3Sha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            12 => Some(Self::EccGost),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if algorithm is supported for validation
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::RsaSha1
                | Self::RsaSha1Nsec3Sha1
                | Self::RsaSha256
                | Self::RsaSha512
                | Self::EcdsaP256Sha256
                | Self::EcdsaP384Sha384
                | Self::Ed25519
        )
    }

    fn rsa_parameters(&self) -> Option<&'static RsaParameters> {
        match self {
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => {
                Some(&signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY)
            }
            Self::RsaSha256 => Some(&signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY),
            Self::RsaSha512 => Some(&signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY),
            _ => None,
        }
    }

    /// Verify `signature` over `message` with a public key in DNSKEY wire
    /// encoding for this algorithm.
    pub fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), DnsSecError> {
        let bad = |_| DnsSecError::SignatureInvalid(format!("{} signature mismatch", self));

        if let Some(params) = self.rsa_parameters() {
            let (e, n) = split_rsa_key(public_key)?;
            return RsaPublicKeyComponents { n, e }
                .verify(params, message, signature)
                .map_err(bad);
        }

        match self {
            Self::EcdsaP256Sha256 | Self::EcdsaP384Sha384 => {
                let (alg, point_len) = if *self == Self::EcdsaP256Sha256 {
                    (&signature::ECDSA_P256_SHA256_FIXED, 64)
                } else {
                    (&signature::ECDSA_P384_SHA384_FIXED, 96)
                };
                if public_key.len() != point_len {
                    return Err(DnsSecError::InvalidPublicKey);
                }
                // DNSKEY stores the bare point; ring expects the SEC1 form.
                let mut sec1 = Vec::with_capacity(point_len + 1);
                sec1.push(0x04);
                sec1.extend_from_slice(public_key);
                UnparsedPublicKey::new(alg, &sec1)
                    .verify(message, signature)
                    .map_err(bad)
            }
            Self::Ed25519 => {
                if public_key.len() != 32 {
                    return Err(DnsSecError::InvalidPublicKey);
                }
                UnparsedPublicKey::new(&signature::ED25519, public_key)
                    .verify(message, signature)
                    .map_err(bad)
            }
            _ => Err(DnsSecError::UnsupportedAlgorithm(self.to_u8())),
        }
    }
}

/// Split an RSA DNSKEY (RFC 3110 §2) into exponent and modulus, leading
/// zeros stripped.
fn split_rsa_key(key: &[u8]) -> Result<(&[u8], &[u8]), DnsSecError> {
    let (exp_len, rest) = match key.split_first() {
        Some((0, rest)) if rest.len() >= 2 => {
            let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
            (len, &rest[2..])
        }
        Some((&len, rest)) if len != 0 => (len as usize, rest),
        _ => return Err(DnsSecError::InvalidPublicKey),
    };
    if exp_len == 0 || rest.len() <= exp_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    let (e, n) = rest.split_at(exp_len);
    Ok((strip_leading_zeros(e), strip_leading_zeros(n)))
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RsaMd5 => write!(f, "RSAMD5"),
            Self::DSA => write!(f, "DSA"),
            Self::RsaSha1 => write!(f, "RSASHA1"),
            Self::DsaNsec3Sha1 => write!(f, "DSA-NSEC3-SHA1"),
            Self::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            Self::RsaSha256 => write!(f, "RSASHA256"),
            Self::RsaSha512 => write!(f, "RSASHA512"),
            Self::EccGost => write!(f, "ECC-GOST"),
            Self::EcdsaP256Sha256 => write!(f, "ECDSAP256SHA256"),
            Self::EcdsaP384Sha384 => write!(f, "ECDSAP384SHA384"),
            Self::Ed25519 => write!(f, "ED25519"),
            Self::Ed448 => write!(f, "ED448"),
        }
    }
}
