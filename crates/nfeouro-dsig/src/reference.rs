#![forbid(unsafe_code)]

//! Reference processing shared by signing and verification.
//!
//! A `#Id` reference selects the target subtree without comments. The
//! enveloped-signature transform removes the `Signature` element from that
//! node-set and C14N turns it into octets. A chain that ends without a
//! canonicalization step is finished with plain C14N 1.0.

use nfeouro_c14n::C14nMode;
use nfeouro_core::ns::{self, attr, node};
use nfeouro_core::{algorithm, Error};
use nfeouro_crypto::DigestAlgorithm;
use nfeouro_xml::document::find_child_element;
use nfeouro_xml::NodeSet;
use roxmltree::{Document, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transform {
    Enveloped,
    C14n(C14nMode),
}

impl Transform {
    pub(crate) fn from_uri(uri: &str) -> Result<Self, Error> {
        if uri == algorithm::ENVELOPED_SIGNATURE {
            return Ok(Self::Enveloped);
        }
        C14nMode::from_uri(uri)
            .map(Self::C14n)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {uri}")))
    }
}

/// The transforms listed under a `Reference`, in document order.
pub(crate) fn read_transforms(reference: Node<'_, '_>) -> Result<Vec<Transform>, Error> {
    let Some(transforms) = find_child_element(reference, ns::DSIG, node::TRANSFORMS) else {
        return Ok(Vec::new());
    };
    transforms
        .children()
        .filter(|n| n.is_element())
        .map(|t| {
            if !t.has_tag_name((ns::DSIG, node::TRANSFORM)) {
                return Err(Error::XmlStructure(format!(
                    "unexpected <{}> in Transforms",
                    t.tag_name().name()
                )));
            }
            let uri = t
                .attribute(attr::ALGORITHM)
                .ok_or_else(|| Error::MissingAttribute("Algorithm on Transform".into()))?;
            Transform::from_uri(uri)
        })
        .collect()
}

/// Run `transforms` over the subtree at `target` and digest the result.
///
/// `signature` is the enveloping `Signature` element, absent while the
/// signature is still being built.
pub(crate) fn digest_reference(
    doc: &Document<'_>,
    target: Node<'_, '_>,
    transforms: &[Transform],
    signature: Option<Node<'_, '_>>,
    digest: DigestAlgorithm,
) -> Result<Vec<u8>, Error> {
    let mut node_set = NodeSet::tree_without_comments(target);
    let mut octets: Option<Vec<u8>> = None;

    for transform in transforms {
        if octets.is_some() {
            return Err(Error::UnsupportedAlgorithm(
                "transform applied after canonicalization".into(),
            ));
        }
        match transform {
            Transform::Enveloped => {
                if let Some(sig) = signature {
                    node_set.remove_subtree(sig);
                }
            }
            Transform::C14n(mode) => {
                octets = Some(nfeouro_c14n::canonicalize_doc(doc, *mode, Some(&node_set))?);
            }
        }
    }

    let octets = match octets {
        Some(octets) => octets,
        None => nfeouro_c14n::canonicalize_doc(doc, C14nMode::Inclusive, Some(&node_set))?,
    };
    tracing::debug!(
        element = target.tag_name().name(),
        bytes = octets.len(),
        digest = digest.uri(),
        "reference canonicalized"
    );
    Ok(digest.digest(&octets))
}

/// Canonical octets of `SignedInfo`, the data covered by `SignatureValue`.
pub(crate) fn signed_info_octets(
    doc: &Document<'_>,
    signed_info: Node<'_, '_>,
    mode: C14nMode,
) -> Result<Vec<u8>, Error> {
    let node_set = if mode.with_comments() {
        NodeSet::tree_with_comments(signed_info)
    } else {
        NodeSet::tree_without_comments(signed_info)
    };
    nfeouro_c14n::canonicalize_doc(doc, mode, Some(&node_set))
}
