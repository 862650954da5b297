#![forbid(unsafe_code)]

//! Pre-parse whitespace stripping.
//!
//! The reception service rejects documents whose signed subtree carries
//! indentation text nodes. Instead of relying on canonicalization to cope
//! with them, every carriage return, line feed and tab is removed from the
//! raw text before it is parsed. Characters inside text content are removed
//! as well; the service behaves the same way, so this is kept as is.

/// Characters removed by [`normalize`].
pub const STRIPPED: [char; 3] = ['\r', '\n', '\t'];

/// Remove every `\r`, `\n` and `\t` from raw XML text.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| !STRIPPED.contains(c)).collect()
}
