#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) reader for A1 credentials.
//!
//! Handles the protections found on ICP-Brasil A1 files in the wild:
//! legacy PBE (SHA-1 with 3DES, RC2-128 or RC2-40), PBES2 (PBKDF2 with
//! AES-CBC) as written by OpenSSL 3.x, and the HMAC-SHA1/SHA-256
//! integrity MAC. Containers are only read, never written.

mod kdf;
mod parse;
mod pbe;

/// A private key bag, decrypted to PKCS#8 DER.
#[derive(Clone)]
pub struct KeyBag {
    pub pkcs8_der: Vec<u8>,
    /// `localKeyId` attribute pairing the key with its certificate.
    pub local_key_id: Option<Vec<u8>>,
}

impl std::fmt::Debug for KeyBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBag")
            .field("pkcs8_der", &format_args!("<{} bytes>", self.pkcs8_der.len()))
            .field("local_key_id", &self.local_key_id)
            .finish()
    }
}

/// An X.509 certificate bag.
#[derive(Debug, Clone)]
pub struct CertBag {
    pub der: Vec<u8>,
    pub local_key_id: Option<Vec<u8>>,
}

/// Contents extracted from a PKCS#12 file, in container order.
#[derive(Debug, Default)]
pub struct Pkcs12Contents {
    pub keys: Vec<KeyBag>,
    pub certificates: Vec<CertBag>,
}

/// Parse a PKCS#12 file, checking its MAC and decrypting with `password`.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<Pkcs12Contents, nfeouro_core::Error> {
    parse::parse_pfx(data, password)
}
