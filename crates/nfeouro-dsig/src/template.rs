#![forbid(unsafe_code)]

//! The `Signature` element as spliced into a DAO document.
//!
//! Layout, in the default XMLDSig namespace and without any whitespace:
//!
//! ```text
//! Signature
//! ├── SignedInfo
//! │   ├── CanonicalizationMethod
//! │   ├── SignatureMethod
//! │   └── Reference URI="#Id"
//! │       ├── Transforms (enveloped-signature, C14N)
//! │       ├── DigestMethod
//! │       └── DigestValue
//! ├── SignatureValue        (left empty, filled after SignedInfo is signed)
//! └── KeyInfo/X509Data/X509Certificate
//! ```

use nfeouro_core::ns::{self, attr, node};
use nfeouro_core::{algorithm, Error, SignatureProfile};
use nfeouro_xml::XmlWriter;

/// Declaration placed in front of every signed document.
pub const XML_DECLARATION: &str = "<?xml version='1.0' encoding='utf-8'?>";

/// Serialized `Signature` with an empty `SignatureValue`.
#[derive(Debug, Clone)]
pub struct SignatureTemplate {
    text: String,
    value_offset: usize,
}

impl SignatureTemplate {
    /// Build the template for a reference to `#reference_id`.
    ///
    /// `certificate_body` is the bare base64 of the signer certificate.
    pub fn build(
        profile: &SignatureProfile,
        reference_id: &str,
        digest_b64: &str,
        certificate_body: &str,
    ) -> Result<Self, Error> {
        let uri = format!("#{reference_id}");
        let mut w = XmlWriter::new();

        w.start_element(node::SIGNATURE, &[("xmlns", ns::DSIG)]);
        w.start_element(node::SIGNED_INFO, &[]);
        w.empty_element(
            node::CANONICALIZATION_METHOD,
            &[(attr::ALGORITHM, profile.canonicalization)],
        );
        w.empty_element(
            node::SIGNATURE_METHOD,
            &[(attr::ALGORITHM, profile.signature_method)],
        );
        w.start_element(node::REFERENCE, &[(attr::URI, uri.as_str())]);
        w.start_element(node::TRANSFORMS, &[]);
        w.empty_element(
            node::TRANSFORM,
            &[(attr::ALGORITHM, algorithm::ENVELOPED_SIGNATURE)],
        );
        w.empty_element(node::TRANSFORM, &[(attr::ALGORITHM, profile.canonicalization)]);
        w.end_element(node::TRANSFORMS)?;
        w.empty_element(node::DIGEST_METHOD, &[(attr::ALGORITHM, profile.digest_method)]);
        w.text_element(node::DIGEST_VALUE, digest_b64)?;
        w.end_element(node::REFERENCE)?;
        w.end_element(node::SIGNED_INFO)?;

        w.start_element(node::SIGNATURE_VALUE, &[]);
        w.end_element(node::SIGNATURE_VALUE)?;

        w.start_element(node::KEY_INFO, &[]);
        w.start_element(node::X509_DATA, &[]);
        w.text_element(node::X509_CERTIFICATE, certificate_body)?;
        w.end_element(node::X509_DATA)?;
        w.end_element(node::KEY_INFO)?;
        w.end_element(node::SIGNATURE)?;

        let mut text: String = w.into_string()?.replace('\n', "");
        let value_offset = signature_value_slot(&mut text)?;
        Ok(Self { text, value_offset })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset inside [`text`](Self::text) where the signature value goes.
    pub fn value_offset(&self) -> usize {
        self.value_offset
    }
}

/// Offset just past the `SignatureValue` start tag, opening the element
/// first if the writer emitted it self-closed.
fn signature_value_slot(text: &mut String) -> Result<usize, Error> {
    let start = text
        .find(&format!("<{}", node::SIGNATURE_VALUE))
        .ok_or_else(|| Error::Signing("template lacks a SignatureValue slot".into()))?;
    let close = text[start..]
        .find('>')
        .map(|at| start + at)
        .ok_or_else(|| Error::Signing("unterminated SignatureValue tag".into()))?;
    if text[..close].ends_with('/') {
        let open_tag = format!("<{}>", node::SIGNATURE_VALUE);
        let end_tag = format!("</{}>", node::SIGNATURE_VALUE);
        text.replace_range(start..=close, &format!("{open_tag}{end_tag}"));
        return Ok(start + open_tag.len());
    }
    Ok(close + 1)
}
