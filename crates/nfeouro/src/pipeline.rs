#![forbid(unsafe_code)]

//! End-to-end DAO processing.
//!
//! Each operation reads the PKCS#12 container again and drops the
//! credential before returning; nothing is cached between calls.

use std::path::{Path, PathBuf};

use nfeouro_core::SignatureProfile;
use nfeouro_dsig::{DsigContext, SignedDocument};
use nfeouro_keys::{Certificate, Credential, CredentialStore};
use nfeouro_transport::{Request, ServiceEndpoint, TransportEnvelope};
use nfeouro_xml::ElementTarget;
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;
use crate::settings::{CredentialSettings, Settings};

/// Location and passphrase of an A1 container.
pub struct CredentialSource {
    path: PathBuf,
    passphrase: SecretString,
}

impl CredentialSource {
    pub fn new(path: impl Into<PathBuf>, passphrase: SecretString) -> Self {
        Self {
            path: path.into(),
            passphrase,
        }
    }

    /// Fill in from settings whatever the caller did not supply.
    pub fn resolve(
        path: Option<PathBuf>,
        passphrase: Option<SecretString>,
        settings: &CredentialSettings,
    ) -> Result<Self, Error> {
        let path = path
            .or_else(|| settings.path.clone())
            .ok_or_else(|| Error::Config("no credential path (--p12 or credential.path)".into()))?;
        let passphrase = passphrase
            .or_else(|| {
                settings
                    .passphrase
                    .as_ref()
                    .map(|p| SecretString::from(p.expose_secret()))
            })
            .ok_or_else(|| {
                Error::Config("no credential passphrase (--passphrase or credential.passphrase)".into())
            })?;
        Ok(Self::new(path, passphrase))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Credential, Error> {
        Ok(CredentialStore::load(
            &self.path,
            self.passphrase.expose_secret(),
        )?)
    }
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSource")
            .field("path", &self.path)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// A signed document framed for submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub signed: SignedDocument,
    pub envelope: TransportEnvelope,
    pub request: Request,
}

/// Signs DAO documents and builds reception service requests.
#[derive(Debug, Clone, Default)]
pub struct DaoSigner {
    ctx: DsigContext,
    endpoint: ServiceEndpoint,
}

impl DaoSigner {
    pub fn new(profile: SignatureProfile, endpoint: ServiceEndpoint) -> Self {
        Self {
            ctx: DsigContext::default().with_profile(profile),
            endpoint,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        Ok(Self::new(settings.profile()?, settings.endpoint()?))
    }

    /// Reference a different element than `{nfeouro}infDAO`.
    pub fn with_target(mut self, target: ElementTarget) -> Self {
        self.ctx = self.ctx.with_target(target);
        self
    }

    pub fn profile(&self) -> SignatureProfile {
        self.ctx.profile
    }

    pub fn target(&self) -> &ElementTarget {
        &self.ctx.target
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Normalize and sign raw XML text.
    pub fn sign(&self, raw_xml: &str, source: &CredentialSource) -> Result<SignedDocument, Error> {
        let credential = source.load()?;
        let normalized = nfeouro_xml::normalize(raw_xml);
        Ok(nfeouro_dsig::sign(&self.ctx, &normalized, &credential)?)
    }

    pub fn sign_bytes(
        &self,
        raw_xml: &[u8],
        source: &CredentialSource,
    ) -> Result<SignedDocument, Error> {
        let text = std::str::from_utf8(raw_xml).map_err(|e| {
            nfeouro_core::Error::XmlParse(format!("document is not UTF-8: {e}"))
        })?;
        self.sign(text, source)
    }

    pub fn sign_file(
        &self,
        path: &Path,
        source: &CredentialSource,
    ) -> Result<SignedDocument, Error> {
        let raw = std::fs::read(path).map_err(|e| Error::File {
            path: path.display().to_string(),
            source: e,
        })?;
        self.sign_bytes(&raw, source)
    }

    /// Sign, verify and frame a document for `POST {base}/nfeouro`.
    pub fn submission(
        &self,
        raw_xml: &str,
        source: &CredentialSource,
        source_ip: &str,
    ) -> Result<Submission, Error> {
        let signed = self.sign(raw_xml, source)?;
        let envelope = nfeouro_transport::encode(&signed.xml, &signed.certificate, source_ip)?;
        if envelope.document()? != signed.xml {
            return Err(nfeouro_core::Error::Transport(
                "encoded document does not decode to the signed text".into(),
            )
            .into());
        }
        let request = self.endpoint.submit(&envelope)?;
        tracing::info!(url = %request.url, "submission prepared");
        Ok(Submission {
            signed,
            envelope,
            request,
        })
    }

    pub fn lookup_by_access_key(
        &self,
        access_key: &str,
        source: &CredentialSource,
        source_ip: &str,
    ) -> Result<Request, Error> {
        let envelope = self.query_envelope(source, source_ip)?;
        Ok(self.endpoint.lookup_by_access_key(access_key, &envelope)?)
    }

    pub fn lookup_by_nsu(
        &self,
        nsu: u64,
        source: &CredentialSource,
        source_ip: &str,
    ) -> Result<Request, Error> {
        let envelope = self.query_envelope(source, source_ip)?;
        Ok(self.endpoint.lookup_by_nsu(nsu, &envelope))
    }

    pub fn verify(&self, signed_xml: &str, certificate: &Certificate) -> Result<bool, Error> {
        Ok(nfeouro_dsig::verify(signed_xml, certificate)?)
    }

    fn query_envelope(
        &self,
        source: &CredentialSource,
        source_ip: &str,
    ) -> Result<TransportEnvelope, Error> {
        let credential = source.load()?;
        Ok(nfeouro_transport::query(credential.certificate(), source_ip)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(passphrase: &str) -> CredentialSource {
        CredentialSource::new(
            format!(
                "{}/../../test-data/credentials/a1-aes-chain.p12",
                env!("CARGO_MANIFEST_DIR")
            ),
            SecretString::from(passphrase),
        )
    }

    #[test]
    fn test_resolve_prefers_explicit_values() {
        let settings = CredentialSettings {
            path: Some(PathBuf::from("/etc/a1.p12")),
            passphrase: Some(SecretString::from("da-config")),
        };
        let resolved =
            CredentialSource::resolve(Some(PathBuf::from("/tmp/b.p12")), None, &settings).unwrap();
        assert_eq!(resolved.path(), Path::new("/tmp/b.p12"));
        assert_eq!(resolved.passphrase.expose_secret(), "da-config");
    }

    #[test]
    fn test_resolve_requires_both() {
        let err = CredentialSource::resolve(None, None, &CredentialSettings::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_source_debug_redacts() {
        assert!(!format!("{:?}", source("senha1")).contains("senha1"));
    }

    #[test]
    fn test_sign_normalizes_first() {
        let raw = "<DAO>\r\n\t<infDAO Id=\"ID1\">\r\n\t\t<a>1</a>\r\n\t</infDAO>\r\n</DAO>\r\n";
        let signer = DaoSigner::default().with_target(ElementTarget::local("infDAO"));
        let signed = signer.sign(raw, &source("senha1")).unwrap();
        assert!(signed.xml.contains("<DAO><infDAO Id=\"ID1\"><a>1</a></infDAO><Signature"));
        assert!(signer.verify(&signed.xml, &signed.certificate).unwrap());
    }

    #[test]
    fn test_sign_bytes_rejects_invalid_utf8() {
        let err = DaoSigner::default()
            .sign_bytes(&[0x3c, 0xff, 0x3e], &source("senha1"))
            .unwrap_err();
        assert!(matches!(err, Error::Core(nfeouro_core::Error::XmlParse(_))));
    }

    #[test]
    fn test_wrong_passphrase() {
        let err = DaoSigner::default()
            .sign("<DAO/>", &source("senha2"))
            .unwrap_err();
        assert!(matches!(err, Error::Core(nfeouro_core::Error::Credential(_))));
    }
}
