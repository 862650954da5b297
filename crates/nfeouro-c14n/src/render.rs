#![forbid(unsafe_code)]

//! Escaping and ordering rules of the canonical form.
//!
//! Text: `&` `<` `>` and `\r` are escaped.
//! Attribute values: additionally `"`, `\t` and `\n`.
//! PI data: `\r` only.

use std::cmp::Ordering;

pub fn push_text(out: &mut Vec<u8>, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            _ => push_char(out, ch),
        }
    }
}

pub fn push_attr_value(out: &mut Vec<u8>, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '"' => out.extend_from_slice(b"&quot;"),
            '\t' => out.extend_from_slice(b"&#x9;"),
            '\n' => out.extend_from_slice(b"&#xA;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            _ => push_char(out, ch),
        }
    }
}

pub fn push_pi_data(out: &mut Vec<u8>, s: &str) {
    for ch in s.chars() {
        if ch == '\r' {
            out.extend_from_slice(b"&#xD;");
        } else {
            push_char(out, ch);
        }
    }
}

fn push_char(out: &mut Vec<u8>, ch: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

/// A namespace declaration on the rendered start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// "" for the default namespace.
    pub prefix: String,
    pub uri: String,
}

impl NsDecl {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        push_attr_value(out, &self.uri);
        out.push(b'"');
    }
}

// The default namespace sorts first because "" is the smallest prefix.
impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix.cmp(&other.prefix)
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A regular attribute on the rendered start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// "" when the attribute has no namespace.
    pub ns_uri: String,
    pub local_name: String,
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        push_attr_value(out, &self.value);
        out.push(b'"');
    }
}

// Unqualified attributes first, then by (namespace URI, local name).
impl Ord for Attr {
    fn cmp(&self, other: &Self) -> Ordering {
        (!self.ns_uri.is_empty(), &self.ns_uri, &self.local_name).cmp(&(
            !other.ns_uri.is_empty(),
            &other.ns_uri,
            &other.local_name,
        ))
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> String {
        let mut out = Vec::new();
        push_text(&mut out, s);
        String::from_utf8(out).unwrap()
    }

    fn attr_value(s: &str) -> String {
        let mut out = Vec::new();
        push_attr_value(&mut out, s);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(text("ouro 24k"), "ouro 24k");
        assert_eq!(text("A & B <c> é"), "A &amp; B &lt;c&gt; é");
        assert_eq!(text("a\rb"), "a&#xD;b");
    }

    #[test]
    fn test_escape_attr_value() {
        assert_eq!(attr_value("a\"b&c>"), "a&quot;b&amp;c>");
        assert_eq!(attr_value("\t\n\r"), "&#x9;&#xA;&#xD;");
    }

    #[test]
    fn test_attribute_order() {
        let attr = |ns: &str, name: &str| Attr {
            ns_uri: ns.into(),
            local_name: name.into(),
            qualified_name: name.into(),
            value: String::new(),
        };
        let mut attrs = vec![
            attr("http://z", "a"),
            attr("", "versao"),
            attr("http://a", "b"),
            attr("", "Id"),
        ];
        attrs.sort();
        let names: Vec<_> = attrs.iter().map(|a| a.local_name.as_str()).collect();
        assert_eq!(names, ["Id", "versao", "b", "a"]);
    }

    #[test]
    fn test_default_namespace_first() {
        let mut decls = vec![
            NsDecl { prefix: "ds".into(), uri: "u1".into() },
            NsDecl { prefix: String::new(), uri: "u2".into() },
        ];
        decls.sort();
        assert!(decls[0].prefix.is_empty());
    }
}
