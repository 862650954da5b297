#![forbid(unsafe_code)]

//! Cryptographic primitives behind DAO signatures.
//!
//! Digests (SHA-1, SHA-256) and RSA PKCS#1 v1.5 signatures, selected by
//! their XML Signature algorithm URI.

pub mod digest;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use sign::{SignatureAlgorithm, SigningKey};
