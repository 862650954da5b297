#![forbid(unsafe_code)]

//! Core types for the NF-e Ouro DAO signing toolkit.
//!
//! Holds the shared error type, the algorithm URIs understood by the
//! signer and verifier, XML namespace constants, and the
//! [`SignatureProfile`] that pins the algorithm choice.

pub mod algorithm;
pub mod error;
pub mod ns;
pub mod profile;

pub use error::{Error, Result};
pub use profile::SignatureProfile;
