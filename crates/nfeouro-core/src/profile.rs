#![forbid(unsafe_code)]

//! The algorithm set used when producing a signature.
//!
//! The receiving service only accepts C14N 1.0 + RSA-SHA1 + SHA-1. SHA-1 is
//! no longer considered collision resistant; it stays the default here
//! solely because the service contract fixes it. Every algorithm decision
//! the signer makes goes through this type, so moving to the SHA-256
//! profile is a configuration change.

use crate::{algorithm, Error};

/// Canonicalization, signature and digest algorithm URIs for one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureProfile {
    pub canonicalization: &'static str,
    pub signature_method: &'static str,
    pub digest_method: &'static str,
}

impl SignatureProfile {
    /// The profile mandated by the NF-e Ouro reception service.
    pub const RSA_SHA1: Self = Self {
        canonicalization: algorithm::C14N,
        signature_method: algorithm::RSA_SHA1,
        digest_method: algorithm::SHA1,
    };

    pub const RSA_SHA256: Self = Self {
        canonicalization: algorithm::C14N,
        signature_method: algorithm::RSA_SHA256,
        digest_method: algorithm::SHA256,
    };

    /// Short name used in configuration files.
    pub fn name(&self) -> &'static str {
        if *self == Self::RSA_SHA256 {
            "rsa-sha256"
        } else {
            "rsa-sha1"
        }
    }
}

impl Default for SignatureProfile {
    fn default() -> Self {
        Self::RSA_SHA1
    }
}

impl std::str::FromStr for SignatureProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rsa-sha1" => Ok(Self::RSA_SHA1),
            "rsa-sha256" => Ok(Self::RSA_SHA256),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "signature profile: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_service_contract() {
        let profile = SignatureProfile::default();
        assert_eq!(profile.canonicalization, algorithm::C14N);
        assert_eq!(profile.signature_method, algorithm::RSA_SHA1);
        assert_eq!(profile.digest_method, algorithm::SHA1);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "RSA-SHA256".parse::<SignatureProfile>().unwrap(),
            SignatureProfile::RSA_SHA256
        );
        assert_eq!(
            "rsa-sha1".parse::<SignatureProfile>().unwrap().name(),
            "rsa-sha1"
        );
        assert!("ecdsa-sha256".parse::<SignatureProfile>().is_err());
    }
}
