#![forbid(unsafe_code)]

//! Loading an A1 credential from a PKCS#12 container.
//!
//! The key and its certificate are paired first by the `localKeyId` bag
//! attribute and then by comparing public keys. Certificates that do not
//! pair with the key are kept as the chain.

use std::path::Path;

use nfeouro_core::Error;
use nfeouro_crypto::SigningKey;
use nfeouro_pkcs12::{CertBag, KeyBag};
use rsa::pkcs8::DecodePrivateKey;

use crate::certificate::Certificate;

/// Private key, its certificate and the rest of the chain.
///
/// Built for one operation and dropped afterwards.
#[derive(Clone)]
pub struct Credential {
    private_key: rsa::RsaPrivateKey,
    certificate: Certificate,
    chain: Vec<Certificate>,
}

impl Credential {
    /// Assemble a credential, checking that key and certificate pair.
    pub fn new(
        private_key: rsa::RsaPrivateKey,
        certificate: Certificate,
        chain: Vec<Certificate>,
    ) -> Result<Self, Error> {
        if !certificate.matches_key(&private_key) {
            return Err(Error::Credential(format!(
                "private key does not match certificate {}",
                certificate.subject()
            )));
        }
        Ok(Self {
            private_key,
            certificate,
            chain,
        })
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::Rsa(self.private_key.clone())
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Intermediate and root certificates shipped in the container.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("private_key", &"<redacted>")
            .field("certificate", &self.certificate)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Reads PKCS#12 containers into [`Credential`]s. Nothing is cached.
pub struct CredentialStore;

impl CredentialStore {
    /// Read a PKCS#12 file and unlock it with `passphrase`.
    pub fn load(path: impl AsRef<Path>, passphrase: &str) -> Result<Credential, Error> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Credential(format!("cannot read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "read PKCS#12 container");
        Self::from_bytes(&data, passphrase)
    }

    /// Unlock an in-memory PKCS#12 container.
    pub fn from_bytes(data: &[u8], passphrase: &str) -> Result<Credential, Error> {
        let contents = nfeouro_pkcs12::parse_pkcs12(data, passphrase)?;
        if contents.keys.is_empty() {
            return Err(Error::Credential("container holds no private key".into()));
        }

        let certificates = contents
            .certificates
            .iter()
            .map(|bag| Certificate::from_der(&bag.der).map(|cert| (bag, cert)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Credential(format!("unusable certificate in container: {e}")))?;

        for key_bag in &contents.keys {
            let private_key = decode_rsa_key(key_bag)?;
            if let Some(index) = find_leaf(key_bag, &private_key, &certificates) {
                let mut chain: Vec<Certificate> =
                    certificates.into_iter().map(|(_, cert)| cert).collect();
                let leaf = chain.remove(index);
                tracing::debug!(
                    subject = leaf.subject(),
                    intermediates = chain.len(),
                    "credential loaded"
                );
                return Credential::new(private_key, leaf, chain);
            }
        }

        Err(Error::Credential(
            "no certificate in the container pairs with the private key".into(),
        ))
    }
}

fn decode_rsa_key(bag: &KeyBag) -> Result<rsa::RsaPrivateKey, Error> {
    rsa::RsaPrivateKey::from_pkcs8_der(&bag.pkcs8_der)
        .map_err(|e| Error::Credential(format!("private key is not a usable RSA key: {e}")))
}

fn find_leaf(
    key_bag: &KeyBag,
    private_key: &rsa::RsaPrivateKey,
    certificates: &[(&CertBag, Certificate)],
) -> Option<usize> {
    let by_key_id = key_bag.local_key_id.as_ref().and_then(|id| {
        certificates.iter().position(|(bag, cert)| {
            bag.local_key_id.as_ref() == Some(id) && cert.matches_key(private_key)
        })
    });
    by_key_id.or_else(|| {
        certificates
            .iter()
            .position(|(_, cert)| cert.matches_key(private_key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture_path(name: &str) -> String {
        format!(
            "{}/../../test-data/credentials/{name}",
            env!("CARGO_MANIFEST_DIR")
        )
    }

    #[test]
    fn test_load_with_chain() {
        let credential = CredentialStore::load(fixture_path("a1-aes-chain.p12"), "senha1").unwrap();
        assert!(credential
            .certificate()
            .subject()
            .contains("EMPRESA TESTE LTDA"));
        assert_eq!(credential.chain().len(), 1);
        assert!(credential.chain()[0]
            .subject()
            .contains("AC Teste Homologacao"));
    }

    #[test]
    fn test_certificate_pem_framing() {
        let credential = CredentialStore::load(fixture_path("a1-3des.p12"), "senha1").unwrap();
        let pem = credential.certificate().pem();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
        assert!(credential.chain().is_empty());
    }

    #[test]
    fn test_all_protections_yield_the_same_leaf() {
        let leaf = Certificate::from_pem(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../test-data/credentials/leaf.pem"
        )))
        .unwrap();
        for name in ["a1-aes-chain.p12", "a1-3des.p12", "a1-rc2-legacy.p12"] {
            let credential = CredentialStore::load(fixture_path(name), "senha1").unwrap();
            assert_eq!(credential.certificate(), &leaf, "{name}");
        }
    }

    #[test]
    fn test_wrong_passphrase() {
        let err = CredentialStore::load(fixture_path("a1-aes-chain.p12"), "errada").unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CredentialStore::load(dir.path().join("absent.p12"), "senha1").unwrap_err();
        assert!(matches!(err, Error::Credential(msg) if msg.contains("absent.p12")));
    }

    #[test]
    fn test_not_a_container() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"-----BEGIN CERTIFICATE-----").unwrap();
        let err = CredentialStore::load(file.path(), "senha1").unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let credential = CredentialStore::load(fixture_path("a1-3des.p12"), "senha1").unwrap();
        let other = Certificate::from_pem(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../test-data/credentials/other.pem"
        )))
        .unwrap();
        let SigningKey::Rsa(key) = credential.signing_key() else {
            panic!("expected a private key");
        };
        assert!(Credential::new(key, other, Vec::new()).is_err());
    }
}
