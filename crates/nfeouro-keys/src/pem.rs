#![forbid(unsafe_code)]

//! Canonical PEM text for certificates.
//!
//! The reception service compares certificate text literally, so every
//! certificate is re-emitted as: the begin marker, the base64 body in
//! 64-column lines, the end marker, each line ending in a single `\n`.
//! Input may be PEM with any line breaks or a bare base64 body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
pub const END: &str = "-----END CERTIFICATE-----";
pub const LINE_WIDTH: usize = 64;

/// Re-wrap certificate text into canonical PEM.
pub fn format(raw: &str) -> String {
    wrap(&body(raw))
}

/// Canonical PEM for a DER-encoded certificate.
pub fn from_der(der: &[u8]) -> String {
    wrap(&STANDARD.encode(der))
}

/// The bare base64 body: markers and all ASCII whitespace removed.
pub fn body(pem: &str) -> String {
    pem.replace(BEGIN, "")
        .replace(END, "")
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect()
}

fn wrap(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + BEGIN.len() + END.len() + 4);
    out.push_str(BEGIN);
    out.push('\n');
    // The body is base64, hence ASCII, so byte chunks are char boundaries.
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(END);
    out.push('\n');
    out
}
