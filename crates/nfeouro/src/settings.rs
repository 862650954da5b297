#![forbid(unsafe_code)]

//! Layered configuration.
//!
//! Sources, later ones winning: built-in defaults, the optional
//! `config/settings.{toml,yaml,json}` file, then `NFEOURO_*` environment
//! variables with `__` between sections (`NFEOURO_CREDENTIAL__PASSPHRASE`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config as ConfigLib, Environment, File};
use nfeouro_core::SignatureProfile;
use nfeouro_transport::endpoint::HOMOLOGATION_URL;
use nfeouro_transport::ServiceEndpoint;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub service: ServiceSettings,
    #[serde(default)]
    pub credential: CredentialSettings,
    pub signing: SigningSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    pub base_url: String,
}

/// Where the A1 credential lives. Both fields may come from the command
/// line instead.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialSettings {
    pub path: Option<PathBuf>,
    pub passphrase: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningSettings {
    /// `rsa-sha1` or `rsa-sha256`
    pub profile: String,
    /// Default value of `X-Forwarded-For`.
    pub source_ip: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self, Error> {
        Self::load_with_sources(None, None)
    }

    /// Load from an explicit settings file instead of `config/settings`.
    pub fn load_file(path: &Path) -> Result<Self, Error> {
        Self::load_with_sources(Some(path), None)
    }

    /// With `overrides` set, the process environment is ignored so that
    /// tests do not see each other's variables.
    pub fn load_with_sources(
        file: Option<&Path>,
        overrides: Option<HashMap<String, String>>,
    ) -> Result<Self, Error> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name("config/settings").required(false),
        };
        let mut builder = ConfigLib::builder()
            .set_default("service.base_url", HOMOLOGATION_URL)?
            .set_default("signing.profile", SignatureProfile::default().name())?
            .add_source(file_source);

        if let Some(vars) = overrides {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            builder = builder.add_source(
                Environment::with_prefix("NFEOURO")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let settings: Self = builder.build()?.try_deserialize()?;
        tracing::debug!(
            base_url = %settings.service.base_url,
            profile = %settings.signing.profile,
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn endpoint(&self) -> Result<ServiceEndpoint, Error> {
        Ok(ServiceEndpoint::new(&self.service.base_url)?)
    }

    pub fn profile(&self) -> Result<SignatureProfile, Error> {
        self.signing
            .profile
            .parse()
            .map_err(|e| Error::Config(format!("signing.profile: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    fn load(vars: &[(&str, &str)]) -> Settings {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::load_with_sources(None, Some(vars)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]);
        assert_eq!(settings.service.base_url, HOMOLOGATION_URL);
        assert_eq!(settings.profile().unwrap(), SignatureProfile::RSA_SHA1);
        assert!(settings.credential.path.is_none());
        assert!(settings.signing.source_ip.is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = load(&[
            ("service.base_url", "https://nfeouro.rfb.gov.br/API"),
            ("credential.path", "/etc/nfeouro/a1.p12"),
            ("credential.passphrase", "senha1"),
            ("signing.profile", "rsa-sha256"),
            ("signing.source_ip", "200.198.1.10"),
        ]);
        assert_eq!(
            settings.endpoint().unwrap().submit_url(),
            "https://nfeouro.rfb.gov.br/API/nfeouro"
        );
        assert_eq!(
            settings.credential.passphrase.as_ref().unwrap().expose_secret(),
            "senha1"
        );
        assert_eq!(settings.profile().unwrap(), SignatureProfile::RSA_SHA256);
        assert_eq!(settings.signing.source_ip.as_deref(), Some("200.198.1.10"));
    }

    #[test]
    fn test_passphrase_not_in_debug_output() {
        let settings = load(&[("credential.passphrase", "senha-secreta")]);
        assert!(!format!("{settings:?}").contains("senha-secreta"));
    }

    #[test]
    fn test_unknown_profile() {
        let settings = load(&[("signing.profile", "ecdsa-sha256")]);
        assert!(matches!(settings.profile(), Err(Error::Config(_))));
    }

    #[test]
    fn test_settings_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[service]\nbase_url = \"http://localhost:8080/API\"\n\n[signing]\nprofile = \"rsa-sha256\"\n"
        )
        .unwrap();
        let settings = Settings::load_with_sources(Some(file.path()), Some(HashMap::new())).unwrap();
        assert_eq!(settings.service.base_url, "http://localhost:8080/API");
        assert_eq!(settings.profile().unwrap(), SignatureProfile::RSA_SHA256);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
