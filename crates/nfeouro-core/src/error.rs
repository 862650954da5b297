#![forbid(unsafe_code)]

/// Errors produced by the NF-e Ouro signing toolkit.
///
/// `Credential`, `ReferenceNotFound`, `Signing` and `Verification` are the
/// failures callers are expected to tell apart; the rest are plumbing
/// errors raised while parsing or encoding. None of them is transient.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential error: {0}")]
    Credential(String),

    #[error("reference target not found: {0}")]
    ReferenceNotFound(String),

    #[error("ambiguous reference target: {0}")]
    AmbiguousReference(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("signature verification failed: {0}")]
    Verification(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("transport encoding error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the signed document itself was judged invalid, as opposed
    /// to it being unreadable or using algorithms that are not supported.
    pub fn is_invalid_signature(&self) -> bool {
        matches!(
            self,
            Error::Verification(_) | Error::AmbiguousReference(_) | Error::InvalidUri(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failure_class() {
        assert_eq!(
            Error::Credential("wrong passphrase".into()).to_string(),
            "credential error: wrong passphrase"
        );
        assert_eq!(
            Error::ReferenceNotFound("infDAO".into()).to_string(),
            "reference target not found: infDAO"
        );
        assert!(Error::Verification("digest".into())
            .to_string()
            .starts_with("signature verification failed"));
    }

    #[test]
    fn test_invalid_signature_classes() {
        assert!(Error::Verification("digest mismatch".into()).is_invalid_signature());
        assert!(Error::AmbiguousReference("ID1".into()).is_invalid_signature());
        assert!(Error::InvalidUri("http://x".into()).is_invalid_signature());
        assert!(!Error::XmlParse("eof".into()).is_invalid_signature());
        assert!(!Error::UnsupportedAlgorithm("exc-c14n".into()).is_invalid_signature());
        assert!(!Error::MissingElement("Signature".into()).is_invalid_signature());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "cert.p12");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
