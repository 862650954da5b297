#![forbid(unsafe_code)]

//! X.509 certificates carrying an RSA public key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use der::{Decode, Encode};
use nfeouro_core::Error;
use rsa::pkcs8::DecodePublicKey;

use crate::pem;

/// A parsed X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    public_key: rsa::RsaPublicKey,
    subject: String,
    issuer: String,
    serial_hex: String,
    not_after: String,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let cert = x509_cert::Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let spki_der = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;
        let public_key = rsa::RsaPublicKey::from_public_key_der(&spki_der).map_err(|e| {
            Error::Certificate(format!("certificate does not carry an RSA key: {e}"))
        })?;

        Ok(Self {
            der: der.to_vec(),
            public_key,
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            serial_hex: tbs
                .serial_number
                .as_bytes()
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect(),
            not_after: tbs.validity.not_after.to_date_time().to_string(),
        })
    }

    /// Parse PEM text or a bare base64 body.
    pub fn from_pem(text: &str) -> Result<Self, Error> {
        let der = STANDARD
            .decode(pem::body(text))
            .map_err(|e| Error::Base64(format!("certificate body: {e}")))?;
        Self::from_der(&der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn public_key(&self) -> &rsa::RsaPublicKey {
        &self.public_key
    }

    /// Subject distinguished name (RFC 4514 form).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn serial_hex(&self) -> &str {
        &self.serial_hex
    }

    pub fn not_after(&self) -> &str {
        &self.not_after
    }

    /// Canonical 64-column PEM.
    pub fn pem(&self) -> String {
        pem::from_der(&self.der)
    }

    /// PEM as produced by the RFC 7468 encoder, independent of [`Certificate::pem`].
    pub fn to_pem(&self) -> Result<String, Error> {
        pem_rfc7468::encode_string("CERTIFICATE", pem_rfc7468::LineEnding::LF, &self.der)
            .map_err(|e| Error::Certificate(format!("PEM encoding failed: {e}")))
    }

    /// True when `key` is the private half of this certificate's key.
    pub fn matches_key(&self, key: &rsa::RsaPrivateKey) -> bool {
        key.to_public_key() == self.public_key
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial_hex)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../test-data/credentials/leaf.pem"
    ));
    const CA: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../test-data/credentials/ca.pem"
    ));

    #[test]
    fn test_leaf_fields() {
        let cert = Certificate::from_pem(LEAF).unwrap();
        assert!(cert.subject().contains("CN=EMPRESA TESTE LTDA:03763656000154"));
        assert!(cert.issuer().contains("CN=AC Teste Homologacao"));
        assert!(!cert.serial_hex().is_empty());
        assert_ne!(cert, Certificate::from_pem(CA).unwrap());
    }

    #[test]
    fn test_native_and_canonical_pem_agree() {
        let cert = Certificate::from_pem(LEAF).unwrap();
        assert_eq!(cert.to_pem().unwrap().trim_end(), cert.pem().trim_end());
        assert_eq!(cert.pem(), pem::format(LEAF));
    }

    #[test]
    fn test_crlf_pem_parses() {
        let crlf = LEAF.replace('\n', "\r\n");
        assert_eq!(
            Certificate::from_pem(&crlf).unwrap(),
            Certificate::from_pem(LEAF).unwrap()
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            Certificate::from_pem("not base64!"),
            Err(Error::Base64(_))
        ));
        assert!(matches!(
            Certificate::from_der(&[0x30, 0x00]),
            Err(Error::Certificate(_))
        ));
    }
}
