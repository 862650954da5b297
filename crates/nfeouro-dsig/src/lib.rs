#![forbid(unsafe_code)]

//! Enveloped XML Digital Signatures over DAO documents.
//!
//! [`sign`] appends an unprefixed `Signature` to the document element,
//! referencing the target element by its `Id`, and checks the result with
//! [`verify`] before returning it.

pub mod context;
mod reference;
pub mod sign;
pub mod template;
pub mod verify;

pub use context::DsigContext;
pub use sign::{sign, SignedDocument};
pub use verify::verify;
