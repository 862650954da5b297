#![forbid(unsafe_code)]

//! Framing of signed DAO documents for the reception service.
//!
//! Nothing here touches the network. [`codec`] turns a signed document and
//! the signer certificate into headers and a JSON body; [`endpoint`]
//! pairs that with the method and URL of each service operation.

pub mod codec;
pub mod endpoint;

pub use codec::{decode_document, encode, query, TransportEnvelope};
pub use endpoint::{Method, Request, ServiceEndpoint};
