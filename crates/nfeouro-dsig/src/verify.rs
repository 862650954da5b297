#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Verification trusts only the certificate handed in by the caller. A
//! certificate embedded in `KeyInfo` is compared against it and a
//! mismatch is logged, but it is never used as the verifying key.

use crate::reference::{self, digest_reference, read_transforms};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use nfeouro_c14n::C14nMode;
use nfeouro_core::ns::{self, attr, node};
use nfeouro_core::Error;
use nfeouro_crypto::digest::digests_match;
use nfeouro_crypto::{DigestAlgorithm, SigningKey};
use nfeouro_keys::Certificate;
use nfeouro_xml::document::{
    find_child_element, find_child_elements, find_element, parse_same_document_ref,
};
use nfeouro_xml::IdMap;
use roxmltree::{Document, Node};

/// Verify the first XMLDSig `Signature` in `xml` with `certificate`.
///
/// Returns `Ok(true)` when every reference digest matches and the
/// `SignatureValue` validates; any failure is an error, a cryptographic
/// mismatch being [`Error::Verification`].
pub fn verify(xml: &str, certificate: &Certificate) -> Result<bool, Error> {
    let doc = nfeouro_xml::parse(xml)?;

    let signature = find_element(&doc, ns::DSIG, node::SIGNATURE)
        .ok_or_else(|| Error::MissingElement("Signature".into()))?;
    let signed_info = find_child_element(signature, ns::DSIG, node::SIGNED_INFO)
        .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;

    let c14n_uri = algorithm_of(signed_info, node::CANONICALIZATION_METHOD)?;
    let c14n_mode = C14nMode::require(c14n_uri)?;
    let sig_method_uri = algorithm_of(signed_info, node::SIGNATURE_METHOD)?;
    let sig_alg = nfeouro_crypto::sign::from_uri(sig_method_uri)?;

    let references = find_child_elements(signed_info, ns::DSIG, node::REFERENCE);
    if references.is_empty() {
        return Err(Error::Verification("SignedInfo holds no Reference".into()));
    }
    let id_map = IdMap::build(&doc);
    for reference in references {
        verify_reference(&doc, reference, signature, &id_map)?;
    }

    check_embedded_certificate(signature, certificate);

    let signature_value = find_child_element(signature, ns::DSIG, node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::MissingElement("SignatureValue".into()))?;
    let sig_bytes = decode_base64(signature_value.text().unwrap_or(""), "SignatureValue")?;

    let canonical = reference::signed_info_octets(&doc, signed_info, c14n_mode)?;
    let key = SigningKey::RsaPublic(certificate.public_key().clone());
    if !sig_alg.verify(&key, &canonical, &sig_bytes)? {
        return Err(Error::Verification(format!(
            "SignatureValue does not validate with the key of {}",
            certificate.subject()
        )));
    }

    tracing::info!(
        subject = certificate.subject(),
        method = sig_method_uri,
        "signature verified"
    );
    Ok(true)
}

/// Resolve one `Reference`, recompute its digest and compare.
fn verify_reference(
    doc: &Document<'_>,
    reference: Node<'_, '_>,
    signature: Node<'_, '_>,
    id_map: &IdMap,
) -> Result<(), Error> {
    let uri = reference
        .attribute(attr::URI)
        .ok_or_else(|| Error::MissingAttribute("URI on Reference".into()))?;
    let id = parse_same_document_ref(uri).ok_or_else(|| {
        Error::InvalidUri(format!(
            "only same-document #Id references are accepted, got {uri:?}"
        ))
    })?;
    let target = id_map.resolve(doc, id)?;

    let transforms = read_transforms(reference)?;
    let digest_alg = DigestAlgorithm::from_uri(algorithm_of(reference, node::DIGEST_METHOD)?)?;
    let expected = find_child_element(reference, ns::DSIG, node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement("DigestValue".into()))?;
    let expected = decode_base64(expected.text().unwrap_or(""), "DigestValue")?;

    let actual = digest_reference(doc, target, &transforms, Some(signature), digest_alg)?;
    if !digests_match(&actual, &expected) {
        return Err(Error::Verification(format!(
            "digest mismatch for reference {uri}"
        )));
    }
    tracing::debug!(uri, "reference digest matches");
    Ok(())
}

/// `Algorithm` attribute of the named DSig child of `parent`.
fn algorithm_of<'a>(parent: Node<'a, 'a>, child: &str) -> Result<&'a str, Error> {
    find_child_element(parent, ns::DSIG, child)
        .ok_or_else(|| Error::MissingElement(child.to_owned()))?
        .attribute(attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute(format!("Algorithm on {child}")))
}

fn check_embedded_certificate(signature: Node<'_, '_>, certificate: &Certificate) {
    let embedded = signature
        .descendants()
        .find(|n| n.has_tag_name((ns::DSIG, node::X509_CERTIFICATE)))
        .and_then(|n| n.text());
    let Some(embedded) = embedded else {
        return;
    };
    let same = decode_base64(embedded, "X509Certificate")
        .is_ok_and(|der| der.as_slice() == certificate.der());
    if !same {
        tracing::warn!(
            subject = certificate.subject(),
            "embedded X509Certificate differs from the verifying certificate"
        );
    }
}

fn decode_base64(text: &str, what: &str) -> Result<Vec<u8>, Error> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}
