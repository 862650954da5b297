#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - renders namespace declarations sorted by prefix, default first
//! - renders attributes sorted by (namespace URI, local name)
//! - expands empty elements into start/end tag pairs
//! - escapes text and attribute values
//! - keeps or drops comments
//!
//! With a [`NodeSet`] only the selected nodes are rendered. An element
//! rendered below an unselected parent carries every in-scope namespace
//! and the `xml:*` attributes it inherits.

use crate::render::{self, Attr, NsDecl};
use nfeouro_core::{ns, Error};
use nfeouro_xml::NodeSet;
use roxmltree::{Node, NodeType};
use std::collections::BTreeMap;

type NsScope = BTreeMap<String, String>;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        with_comments,
        node_set,
    };
    ctx.process_node(doc.root(), &mut output, &NsScope::new())?;
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |set| set.contains(node))
    }

    fn process_node(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &NsScope,
    ) -> Result<(), Error> {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns)?;
                }
            }
            NodeType::Element => self.process_element(node, output, rendered_ns)?,
            NodeType::Text => {
                if self.is_visible(&node) {
                    render::push_text(output, node.text().unwrap_or(""));
                }
            }
            NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    with_document_level_breaks(node, output, |out| {
                        out.extend_from_slice(b"<!--");
                        out.extend_from_slice(node.text().unwrap_or("").as_bytes());
                        out.extend_from_slice(b"-->");
                    });
                }
            }
            NodeType::PI => {
                if let Some(pi) = node.pi().filter(|_| self.is_visible(&node)) {
                    with_document_level_breaks(node, output, |out| {
                        out.extend_from_slice(b"<?");
                        out.extend_from_slice(pi.target.as_bytes());
                        if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                            out.push(b' ');
                            render::push_pi_data(out, value);
                        }
                        out.extend_from_slice(b"?>");
                    });
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: Node<'_, '_>,
        output: &mut Vec<u8>,
        rendered_ns: &NsScope,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Descendants compare against the nearest rendered ancestor,
            // so the scope passes through unchanged.
            for child in node.children() {
                self.process_node(child, output, rendered_ns)?;
            }
            return Ok(());
        }

        let in_scope = inscope_namespaces(&node);

        let mut ns_decls: Vec<NsDecl> = in_scope
            .iter()
            .filter(|(prefix, uri)| rendered_ns.get(*prefix) != Some(*uri))
            .map(|(prefix, uri)| NsDecl {
                prefix: prefix.clone(),
                uri: uri.clone(),
            })
            .collect();

        // A default namespace in effect on the rendered ancestor but not
        // here has to be undeclared explicitly.
        if rendered_ns.get("").is_some_and(|d| !d.is_empty()) && !in_scope.contains_key("") {
            ns_decls.push(NsDecl {
                prefix: String::new(),
                uri: String::new(),
            });
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = node
            .attributes()
            .map(|attr| {
                let ns_uri = attr.namespace().unwrap_or("");
                let qualified_name = match attribute_prefix(&node, ns_uri) {
                    Some(prefix) => format!("{prefix}:{}", attr.name()),
                    None => attr.name().to_owned(),
                };
                Attr {
                    ns_uri: ns_uri.to_owned(),
                    local_name: attr.name().to_owned(),
                    qualified_name,
                    value: attr.value().to_owned(),
                }
            })
            .collect();

        if self.node_set.is_some() {
            let parent_rendered = node
                .parent()
                .is_some_and(|p| p.is_element() && self.is_visible(&p));
            if !parent_rendered {
                let inherited = inherited_xml_attrs(&node, &attrs);
                attrs.extend(inherited);
            }
        }
        attrs.sort();

        let name = nfeouro_xml::document::qualified_name(&node).ok_or_else(|| {
            Error::Canonicalization(format!(
                "cannot recover the name of <{}>",
                node.tag_name().name()
            ))
        })?;

        output.push(b'<');
        output.extend_from_slice(name.as_bytes());
        for decl in &ns_decls {
            decl.write_to(output);
        }
        for attr in &attrs {
            attr.write_to(output);
        }
        output.push(b'>');

        let mut child_ns = rendered_ns.clone();
        child_ns.remove("");
        child_ns.extend(in_scope);
        for child in node.children() {
            self.process_node(child, output, &child_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(name.as_bytes());
        output.push(b'>');
        Ok(())
    }
}

/// Comments and PIs outside the document element are separated from it
/// by a single line feed.
fn with_document_level_breaks(
    node: Node<'_, '_>,
    output: &mut Vec<u8>,
    render: impl FnOnce(&mut Vec<u8>),
) {
    let top_level = node.parent().is_some_and(|p| p.node_type() == NodeType::Root);
    if top_level && node.prev_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }
    render(output);
    if top_level && node.next_siblings().any(|s| s.is_element()) {
        output.push(b'\n');
    }
}

/// Prefix → URI for every namespace in scope at `node`, `xml` excluded.
///
/// roxmltree already resolves inheritance per element. An undeclared
/// default namespace (`xmlns=""`) is left out.
fn inscope_namespaces(node: &Node<'_, '_>) -> NsScope {
    node.namespaces()
        .filter(|ns| !ns.uri().is_empty())
        .map(|ns| (ns.name().unwrap_or(""), ns.uri()))
        .filter(|(prefix, _)| *prefix != "xml")
        .map(|(prefix, uri)| (prefix.to_owned(), uri.to_owned()))
        .collect()
}

/// `xml:*` attributes from ancestors that `node` does not override,
/// nearest ancestor first.
fn inherited_xml_attrs(node: &Node<'_, '_>, own: &[Attr]) -> Vec<Attr> {
    let mut found: BTreeMap<String, String> = BTreeMap::new();
    for ancestor in node.ancestors().skip(1).filter(|n| n.is_element()) {
        for attr in ancestor.attributes() {
            if attr.namespace() == Some(ns::XML) {
                found
                    .entry(attr.name().to_owned())
                    .or_insert_with(|| attr.value().to_owned());
            }
        }
    }
    found
        .into_iter()
        .filter(|(name, _)| {
            !own
                .iter()
                .any(|a| a.ns_uri == ns::XML && a.local_name == *name)
        })
        .map(|(name, value)| Attr {
            ns_uri: ns::XML.to_owned(),
            qualified_name: format!("xml:{name}"),
            local_name: name,
            value,
        })
        .collect()
}

/// Attributes never take the default namespace, so look for a named prefix.
fn attribute_prefix<'a>(node: &Node<'a, '_>, ns_uri: &str) -> Option<&'a str> {
    if ns_uri.is_empty() {
        return None;
    }
    if ns_uri == ns::XML {
        return Some("xml");
    }
    node.namespaces()
        .find(|ns| ns.uri() == ns_uri && ns.name().is_some_and(|p| !p.is_empty()))
        .and_then(|ns| ns.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap()
    }

    fn c14n_subtree(xml: &str, name: &str) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let node = doc.descendants().find(|n| n.has_tag_name(name)).unwrap();
        let set = NodeSet::tree_without_comments(node);
        String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap()
    }

    #[test]
    fn test_attribute_sorting_and_empty_elements() {
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn test_namespaced_attribute_order() {
        assert_eq!(
            c14n(r#"<e xmlns:z="http://a" xmlns:a="http://z" a:x="1" z:y="2" b="3"/>"#),
            r#"<e xmlns:a="http://z" xmlns:z="http://a" b="3" z:y="2" a:x="1"></e>"#
        );
    }

    #[test]
    fn test_redundant_declarations_dropped() {
        assert_eq!(
            c14n(r#"<a xmlns="urn:x"><b xmlns="urn:x"><p:c xmlns:p="urn:p"/></b></a>"#),
            r#"<a xmlns="urn:x"><b><p:c xmlns:p="urn:p"></p:c></b></a>"#
        );
    }

    #[test]
    fn test_default_namespace_undeclared() {
        assert_eq!(
            c14n(r#"<a xmlns="urn:x"><b xmlns=""/></a>"#),
            r#"<a xmlns="urn:x"><b xmlns=""></b></a>"#
        );
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(
            c14n("<root attr='a&quot;b'>a &amp; b &lt; c &gt; d</root>"),
            r#"<root attr="a&quot;b">a &amp; b &lt; c &gt; d</root>"#
        );
    }

    #[test]
    fn test_comments_and_pis_at_document_level() {
        let xml = "<?pi data?><!--c--><r><!--inner--></r><!--after-->";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let without = String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap();
        assert_eq!(without, "<?pi data?>\n<r></r>");
        let with = String::from_utf8(canonicalize(&doc, true, None).unwrap()).unwrap();
        assert_eq!(with, "<?pi data?>\n<!--c-->\n<r><!--inner--></r>\n<!--after-->");
    }

    #[test]
    fn test_subtree_inherits_namespaces() {
        let xml = r#"<DAO xmlns="http://www.sped.fazenda.gov.br/nfeouro" versao="1.00"><infDAO Id="X"><v>1</v></infDAO></DAO>"#;
        assert_eq!(
            c14n_subtree(xml, "infDAO"),
            r#"<infDAO xmlns="http://www.sped.fazenda.gov.br/nfeouro" Id="X"><v>1</v></infDAO>"#
        );
    }

    #[test]
    fn test_subtree_inherits_xml_attributes() {
        let xml = r#"<r xml:lang="pt"><s Id="1"/></r>"#;
        assert_eq!(c14n_subtree(xml, "s"), r#"<s Id="1" xml:lang="pt"></s>"#);
    }

    #[test]
    fn test_prefixed_element_names_preserved() {
        let xml = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature>"#;
        assert_eq!(
            c14n_subtree(xml, "SignedInfo"),
            r#"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"></ds:SignedInfo>"#
        );
    }

    #[test]
    fn test_removed_subtree_is_skipped() {
        let xml = r#"<r><a>keep</a><Signature><b/></Signature></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut set = NodeSet::all_without_comments(&doc);
        let sig = doc
            .descendants()
            .find(|n| n.has_tag_name("Signature"))
            .unwrap();
        set.remove_subtree(sig);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        assert_eq!(out, "<r><a>keep</a></r>");
    }
}
