#![forbid(unsafe_code)]

//! Signed document and certificate encoding.
//!
//! The document travels gzip-compressed and base64-encoded in the
//! `XmlGzipDao` JSON field. The certificate travels as the base64 of its
//! PEM text in two headers, one per proxy flavour the service sits behind.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use nfeouro_core::Error;
use nfeouro_keys::Certificate;
use serde::{Deserialize, Serialize};

/// Header names of the service contract.
pub mod header {
    pub const SSL_CLIENT_CERT: &str = "X-SSL-Client-Cert";
    pub const ARR_CLIENT_CERT: &str = "X-ARR-ClientCert";
    pub const FORWARDED_FOR: &str = "X-Forwarded-For";
    pub const CONTENT_TYPE: &str = "Content-Type";
}

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// JSON body of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoBody {
    #[serde(rename = "XmlGzipDao")]
    pub xml_gzip_dao: String,
}

/// Headers and, for submissions, the encoded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportEnvelope {
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<DaoBody>,
}

impl TransportEnvelope {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The body as JSON text, `None` for header-only envelopes.
    pub fn body_json(&self) -> Result<Option<String>, Error> {
        self.body
            .as_ref()
            .map(|body| {
                serde_json::to_string(body)
                    .map_err(|e| Error::Transport(format!("cannot serialize body: {e}")))
            })
            .transpose()
    }

    /// Recover the signed document carried in the body.
    pub fn document(&self) -> Result<String, Error> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| Error::Transport("envelope carries no document".into()))?;
        decode_document(&body.xml_gzip_dao)
    }
}

/// Frame a signed document for submission.
pub fn encode(
    signed_xml: &str,
    certificate: &Certificate,
    source_ip: &str,
) -> Result<TransportEnvelope, Error> {
    let mut envelope = query(certificate, source_ip)?;
    let compressed = gzip(signed_xml.as_bytes())?;
    let encoded = STANDARD.encode(&compressed);
    tracing::info!(
        xml_bytes = signed_xml.len(),
        gzip_bytes = compressed.len(),
        "document encoded for transport"
    );
    envelope.body = Some(DaoBody {
        xml_gzip_dao: encoded,
    });
    Ok(envelope)
}

/// Header-only envelope used by the lookup operations.
pub fn query(certificate: &Certificate, source_ip: &str) -> Result<TransportEnvelope, Error> {
    let source_ip = source_ip.trim();
    source_ip
        .parse::<IpAddr>()
        .map_err(|e| Error::Transport(format!("source address {source_ip:?}: {e}")))?;

    let cert_header = STANDARD.encode(certificate.to_pem()?);
    let headers = BTreeMap::from([
        (header::SSL_CLIENT_CERT.to_owned(), cert_header.clone()),
        (header::ARR_CLIENT_CERT.to_owned(), cert_header),
        (header::FORWARDED_FOR.to_owned(), source_ip.to_owned()),
        (header::CONTENT_TYPE.to_owned(), CONTENT_TYPE_JSON.to_owned()),
    ]);
    Ok(TransportEnvelope {
        headers,
        body: None,
    })
}

/// Reverse the `XmlGzipDao` encoding.
pub fn decode_document(encoded: &str) -> Result<String, Error> {
    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Base64(format!("XmlGzipDao: {e}")))?;
    let mut xml = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut xml)
        .map_err(|e| Error::Transport(format!("XmlGzipDao is not gzip UTF-8 text: {e}")))?;
    Ok(xml)
}

// mtime stays 0 so that equal documents compress to equal bytes.
fn gzip(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LEAF: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../test-data/credentials/leaf.pem"
    ));

    fn leaf() -> Certificate {
        Certificate::from_pem(LEAF).unwrap()
    }

    const SIGNED: &str = "<?xml version='1.0' encoding='utf-8'?><DAO><infDAO Id=\"ID1\"><a>ação</a></infDAO></DAO>";

    #[test]
    fn test_headers() {
        let envelope = encode(SIGNED, &leaf(), "200.198.1.10").unwrap();
        let cert = envelope.header(header::SSL_CLIENT_CERT).unwrap();
        assert_eq!(envelope.header(header::ARR_CLIENT_CERT), Some(cert));
        assert_eq!(envelope.header(header::FORWARDED_FOR), Some("200.198.1.10"));
        assert_eq!(
            envelope.header(header::CONTENT_TYPE),
            Some("application/json")
        );

        let pem = String::from_utf8(STANDARD.decode(cert).unwrap()).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(Certificate::from_pem(&pem).unwrap(), leaf());
    }

    #[test]
    fn test_document_round_trip() {
        let envelope = encode(SIGNED, &leaf(), "::1").unwrap();
        assert_eq!(envelope.document().unwrap(), SIGNED);
    }

    #[test]
    fn test_body_json_field_name() {
        let envelope = encode(SIGNED, &leaf(), "10.0.0.1").unwrap();
        let json = envelope.body_json().unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let field = value["XmlGzipDao"].as_str().unwrap();
        assert_eq!(decode_document(field).unwrap(), SIGNED);
        assert_eq!(value.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_gzip_is_deterministic() {
        let a = encode(SIGNED, &leaf(), "10.0.0.1").unwrap();
        let b = encode(SIGNED, &leaf(), "10.0.0.1").unwrap();
        assert_eq!(a, b);
        let raw = STANDARD.decode(&a.body.unwrap().xml_gzip_dao).unwrap();
        // gzip magic, deflate, MTIME all zero
        assert_eq!(&raw[..3], &[0x1f, 0x8b, 0x08]);
        assert_eq!(&raw[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_query_has_no_body() {
        let envelope = query(&leaf(), "10.0.0.1").unwrap();
        assert!(envelope.body.is_none());
        assert_eq!(envelope.body_json().unwrap(), None);
        assert!(envelope.document().is_err());
        assert_eq!(envelope.headers.len(), 4);
    }

    #[test]
    fn test_bad_source_ip() {
        assert!(matches!(
            query(&leaf(), "meu-ip"),
            Err(Error::Transport(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_document("%%%"), Err(Error::Base64(_))));
        let not_gzip = STANDARD.encode(b"<DAO/>");
        assert!(matches!(
            decode_document(&not_gzip),
            Err(Error::Transport(_))
        ));
    }

    proptest! {
        #[test]
        fn encoded_text_round_trips(text in "\\PC{0,400}") {
            let envelope = encode(&text, &leaf(), "127.0.0.1").unwrap();
            prop_assert_eq!(envelope.document().unwrap(), text);
        }
    }
}
