#![forbid(unsafe_code)]

//! RSA PKCS#1 v1.5 signatures (`rsa-sha1`, `rsa-sha256`).

use crate::digest::DigestAlgorithm;
use nfeouro_core::{algorithm, Error};
use signature::{SignatureEncoding, Signer, Verifier};

/// Key material for signature operations.
#[derive(Clone)]
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
}

impl SigningKey {
    pub fn public_key(&self) -> rsa::RsaPublicKey {
        match self {
            Self::Rsa(sk) => sk.to_public_key(),
            Self::RsaPublic(pk) => pk.clone(),
        }
    }
}

// Private key material stays out of debug output.
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use rsa::traits::PublicKeyParts;
        match self {
            Self::Rsa(sk) => write!(f, "SigningKey::Rsa({} bits)", sk.size() * 8),
            Self::RsaPublic(pk) => write!(f, "SigningKey::RsaPublic({} bits)", pk.size() * 8),
        }
    }
}

/// A signature algorithm addressed by its `SignatureMethod` URI.
pub trait SignatureAlgorithm: Send + Sync {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA1,
            hash: DigestAlgorithm::Sha1,
        })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA256,
            hash: DigestAlgorithm::Sha256,
        })),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "signature algorithm: {uri}"
        ))),
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 {
    uri: &'static str,
    hash: DigestAlgorithm,
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        let SigningKey::Rsa(private_key) = key else {
            return Err(Error::Signing("RSA private key required".into()));
        };
        let signature = match self.hash {
            DigestAlgorithm::Sha1 => {
                rsa::pkcs1v15::SigningKey::<sha1::Sha1>::new(private_key.clone())
                    .try_sign(data)
                    .map(|s| s.to_vec())
            }
            DigestAlgorithm::Sha256 => {
                rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(private_key.clone())
                    .try_sign(data)
                    .map(|s| s.to_vec())
            }
        };
        signature.map_err(|e| Error::Signing(format!("RSA signing failed: {e}")))
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let public_key = key.public_key();
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Verification(format!("malformed RSA signature: {e}")))?;
        let ok = match self.hash {
            DigestAlgorithm::Sha1 => rsa::pkcs1v15::VerifyingKey::<sha1::Sha1>::new(public_key)
                .verify(data, &sig)
                .is_ok(),
            DigestAlgorithm::Sha256 => {
                rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(public_key)
                    .verify(data, &sig)
                    .is_ok()
            }
        };
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::DecodePrivateKey;

    const KEY_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../test-data/keys/rsa-2048.pem"
    ));

    fn key() -> SigningKey {
        SigningKey::Rsa(rsa::RsaPrivateKey::from_pkcs8_pem(KEY_PEM).unwrap())
    }

    #[test]
    fn test_rsa_sha1_sign_verify() {
        let alg = from_uri(algorithm::RSA_SHA1).unwrap();
        let key = key();
        let sig = alg.sign(&key, b"<SignedInfo></SignedInfo>").unwrap();
        assert_eq!(sig.len(), 256);
        assert!(alg.verify(&key, b"<SignedInfo></SignedInfo>", &sig).unwrap());
        assert!(!alg.verify(&key, b"<SignedInfo> </SignedInfo>", &sig).unwrap());
    }

    #[test]
    fn test_verify_with_public_key_only() {
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        let key = key();
        let sig = alg.sign(&key, b"data").unwrap();
        let public = SigningKey::RsaPublic(key.public_key());
        assert!(alg.verify(&public, b"data", &sig).unwrap());
        assert!(alg.sign(&public, b"data").is_err());
    }

    #[test]
    fn test_hash_mismatch_fails() {
        let key = key();
        let sig = from_uri(algorithm::RSA_SHA256).unwrap().sign(&key, b"data").unwrap();
        let sha1 = from_uri(algorithm::RSA_SHA1).unwrap();
        assert!(!sha1.verify(&key, b"data", &sig).unwrap());
    }

    #[test]
    fn test_unsupported_uri() {
        assert!(matches!(
            from_uri("http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", key());
        assert_eq!(rendered, "SigningKey::Rsa(2048 bits)");
    }
}
