#![forbid(unsafe_code)]

//! Enveloped signature creation.
//!
//! The digest is computed over the unsigned document. The `Signature` is
//! then spliced in as the last child of the document element, SignedInfo
//! is canonicalized in that final context and signed, and the value is
//! written into the empty `SignatureValue` slot by byte offset.

use crate::context::DsigContext;
use crate::reference::{self, digest_reference, Transform};
use crate::template::{SignatureTemplate, XML_DECLARATION};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use nfeouro_c14n::C14nMode;
use nfeouro_core::ns::{self, node};
use nfeouro_core::Error;
use nfeouro_crypto::DigestAlgorithm;
use nfeouro_keys::{Certificate, Credential};
use nfeouro_xml::document::{find_child_element, qualified_name};
use nfeouro_xml::IdMap;
use roxmltree::Document;

/// A signed document and the certificate that verifies it.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub xml: String,
    pub certificate: Certificate,
}

/// Sign an already normalized document.
///
/// The result has passed [`verify`](crate::verify) with the credential's
/// certificate.
pub fn sign(
    ctx: &DsigContext,
    xml: &str,
    credential: &Credential,
) -> Result<SignedDocument, Error> {
    let profile = ctx.profile;
    let certificate = credential.certificate();
    let key = credential.signing_key();
    if key.public_key() != *certificate.public_key() {
        return Err(Error::Signing(format!(
            "private key does not belong to {}",
            certificate.subject()
        )));
    }

    let mode = C14nMode::require(profile.canonicalization)?;
    let digest_alg = DigestAlgorithm::from_uri(profile.digest_method)?;
    let sig_alg = nfeouro_crypto::sign::from_uri(profile.signature_method)?;

    let doc = nfeouro_xml::parse(xml)?;
    let element_text = document_element_text(&doc)?;
    nfeouro_xml::parse(element_text).map_err(|e| {
        Error::XmlStructure(format!(
            "document element does not parse without its prolog (entities declared in a DTD?): {e}"
        ))
    })?;
    let (target, id) = ctx.target.locate(&doc)?;
    IdMap::build(&doc).resolve(&doc, id)?;
    tracing::debug!(element = %ctx.target, id, "reference target located");

    let digest = digest_reference(
        &doc,
        target,
        &[Transform::Enveloped, Transform::C14n(mode)],
        None,
        digest_alg,
    )?;
    let template = SignatureTemplate::build(
        &profile,
        id,
        &STANDARD.encode(&digest),
        &nfeouro_keys::pem::body(&certificate.pem()),
    )?;
    let (mut signed, value_offset) = envelop(&doc, &template)?;

    let signature_value = {
        let signed_doc = nfeouro_xml::parse(&signed)?;
        let signature = signed_doc
            .root_element()
            .children()
            .filter(|n| n.has_tag_name((ns::DSIG, node::SIGNATURE)))
            .last()
            .ok_or_else(|| Error::Signing("Signature element was not spliced in".into()))?;
        let signed_info = find_child_element(signature, ns::DSIG, node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;
        let canonical = reference::signed_info_octets(&signed_doc, signed_info, mode)?;
        sig_alg.sign(&key, &canonical)?
    };
    signed.insert_str(value_offset, &STANDARD.encode(&signature_value));

    crate::verify::verify(&signed, certificate)
        .map_err(|e| Error::Verification(format!("signed document failed its self-check: {e}")))?;

    tracing::info!(
        id,
        profile = profile.name(),
        subject = certificate.subject(),
        bytes = signed.len(),
        "document signed"
    );
    Ok(SignedDocument {
        xml: signed,
        certificate: certificate.clone(),
    })
}

/// Emit the declaration and the document element with the signature
/// appended before its end tag.
///
/// Anything outside the document element (old declaration, comments,
/// PIs, DOCTYPE) is dropped. Returns the text and the absolute offset of
/// the `SignatureValue` slot.
fn envelop(doc: &Document<'_>, template: &SignatureTemplate) -> Result<(String, usize), Error> {
    let root = doc.root_element();
    let source = document_element_text(doc)?;
    let name = qualified_name(&root).unwrap_or_default();
    let end_tag = source
        .rfind("</")
        .filter(|_| !source.ends_with("/>"))
        .ok_or_else(|| {
            Error::ReferenceNotFound(format!("document element <{name}> has no content"))
        })?;

    let mut out =
        String::with_capacity(XML_DECLARATION.len() + source.len() + template.text().len());
    out.push_str(XML_DECLARATION);
    out.push_str(&source[..end_tag]);
    let signature_start = out.len();
    out.push_str(template.text());
    out.push_str(&source[end_tag..]);
    Ok((out, signature_start + template.value_offset()))
}

/// Source text of the document element, prolog and epilog excluded.
fn document_element_text<'a>(doc: &'a Document<'_>) -> Result<&'a str, Error> {
    doc.input_text()
        .get(doc.root_element().range())
        .ok_or_else(|| Error::XmlStructure("document element lies outside the input".into()))
}
