#![forbid(unsafe_code)]

//! NF-e Ouro DAO signing toolkit.
//!
//! [`DaoSigner`] runs the whole pipeline: load the A1 credential,
//! normalize the document, sign it, verify the result and frame it for the
//! reception service. The member crates are re-exported for callers that
//! need a single step.

pub use nfeouro_c14n as c14n;
pub use nfeouro_core as core;
pub use nfeouro_crypto as crypto;
pub use nfeouro_dsig as dsig;
pub use nfeouro_keys as keys;
pub use nfeouro_pkcs12 as pkcs12;
pub use nfeouro_transport as transport;
pub use nfeouro_xml as xml;

pub mod error;
pub mod pipeline;
pub mod settings;
pub mod telemetry;

pub use error::Error;
pub use pipeline::{CredentialSource, DaoSigner, Submission};
pub use settings::Settings;
