#![forbid(unsafe_code)]

//! Credentials and certificates for DAO signing.
//!
//! An A1 credential is a PKCS#12 file holding one RSA private key, the
//! certificate issued for it and, usually, the issuing chain.

pub mod certificate;
pub mod credential;
pub mod pem;

pub use certificate::Certificate;
pub use credential::{Credential, CredentialStore};
