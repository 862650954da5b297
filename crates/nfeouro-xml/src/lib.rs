#![forbid(unsafe_code)]

//! XML document helpers for the NF-e Ouro signing toolkit.
//!
//! Provides lookup helpers over `roxmltree`, the `NodeSet` used for
//! document-subset canonicalization, the pre-parse whitespace normalizer
//! and an `uppsala`-backed XML writer for building the `Signature` element.

pub mod document;
pub mod nodeset;
pub mod normalize;
pub mod writer;

pub use document::{ElementTarget, IdMap};
pub use nodeset::NodeSet;
pub use normalize::normalize;
pub use writer::XmlWriter;

use nfeouro_core::Error;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree does not expand external entities, so accepting an internal
/// DTD subset does not open the door to entity-expansion attacks.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse XML text with the crate's parsing options.
pub fn parse(text: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse_with_options(text, parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))
}
