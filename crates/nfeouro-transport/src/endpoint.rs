#![forbid(unsafe_code)]

//! Reception service operations and their URLs.
//!
//! The base URL is configuration. The homologation and production values
//! known at the time of writing are provided as constants.

use std::collections::BTreeMap;

use nfeouro_core::Error;
use serde::Serialize;
use url::Url;

use crate::codec::TransportEnvelope;

pub const HOMOLOGATION_URL: &str = "https://hom-nfoe.estaleiro.serpro.gov.br/API";
pub const PRODUCTION_URL: &str = "https://nfeouro.rfb.gov.br/API";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

/// Everything an HTTP client needs to issue one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// A reception service deployment, identified by its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base_url: String,
}

impl ServiceEndpoint {
    /// Validate `base_url` as an absolute http(s) URL with a host and no
    /// query or fragment. A trailing `/` is dropped.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let url = Url::parse(base_url.trim())
            .map_err(|e| Error::Transport(format!("service base URL {base_url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Transport(format!(
                "service base URL must use http or https, got {:?}",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::Transport(format!(
                "service base URL {base_url:?} has no host"
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(Error::Transport(format!(
                "service base URL {base_url:?} must not carry a query or fragment"
            )));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(Error::Transport(
                "service base URL must not carry credentials".into(),
            ));
        }
        Ok(Self {
            base_url: url.as_str().trim_end_matches('/').to_owned(),
        })
    }

    pub fn homologation() -> Self {
        Self {
            base_url: HOMOLOGATION_URL.to_owned(),
        }
    }

    pub fn production() -> Self {
        Self {
            base_url: PRODUCTION_URL.to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base}/nfeouro`
    pub fn submit_url(&self) -> String {
        format!("{}/nfeouro", self.base_url)
    }

    /// `GET {base}/nfeouro/{access_key}`
    pub fn access_key_url(&self, access_key: &str) -> Result<String, Error> {
        if access_key.is_empty() || !access_key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Transport(format!(
                "access key must be decimal digits, got {access_key:?}"
            )));
        }
        Ok(format!("{}/nfeouro/{access_key}", self.base_url))
    }

    /// `GET {base}/nsu/{nsu}/nfeouro`
    pub fn nsu_url(&self, nsu: u64) -> String {
        format!("{}/nsu/{nsu}/nfeouro", self.base_url)
    }

    /// Submission of a signed DAO; `envelope` must carry the document.
    pub fn submit(&self, envelope: &TransportEnvelope) -> Result<Request, Error> {
        let body = envelope
            .body
            .as_ref()
            .ok_or_else(|| Error::Transport("submission requires a document body".into()))?;
        let body = serde_json::to_value(body)
            .map_err(|e| Error::Transport(format!("cannot serialize body: {e}")))?;
        Ok(Request {
            method: Method::Post,
            url: self.submit_url(),
            headers: envelope.headers.clone(),
            body: Some(body),
        })
    }

    pub fn lookup_by_access_key(
        &self,
        access_key: &str,
        envelope: &TransportEnvelope,
    ) -> Result<Request, Error> {
        Ok(Self::lookup(self.access_key_url(access_key)?, envelope))
    }

    pub fn lookup_by_nsu(&self, nsu: u64, envelope: &TransportEnvelope) -> Request {
        Self::lookup(self.nsu_url(nsu), envelope)
    }

    fn lookup(url: String, envelope: &TransportEnvelope) -> Request {
        Request {
            method: Method::Get,
            url,
            headers: envelope.headers.clone(),
            body: None,
        }
    }
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self::homologation()
    }
}
