#![forbid(unsafe_code)]

//! Canonical XML 1.0 for DAO signatures.
//!
//! Only the inclusive 1.0 variants are implemented, with and without
//! comments. Those are the algorithms the reception service accepts in
//! both `CanonicalizationMethod` and the reference transform chain.

pub mod inclusive;
pub mod render;

use nfeouro_core::{algorithm, Error};
use nfeouro_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
}

impl C14nMode {
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            _ => None,
        }
    }

    /// Like [`from_uri`](Self::from_uri), failing with `UnsupportedAlgorithm`.
    pub fn require(uri: &str) -> Result<Self, Error> {
        Self::from_uri(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("canonicalization: {uri}")))
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments)
    }
}

/// Canonicalize a whole XML document given as text.
pub fn canonicalize(xml: &str, mode: C14nMode) -> Result<Vec<u8>, Error> {
    let doc = nfeouro_xml::parse(xml)?;
    canonicalize_doc(&doc, mode, None)
}

/// Canonicalize a parsed document, optionally restricted to `node_set`.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    inclusive::canonicalize(doc, mode.with_comments(), node_set)
}
