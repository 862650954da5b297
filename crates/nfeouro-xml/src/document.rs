#![forbid(unsafe_code)]

//! Element lookup and `Id` attribute registration over roxmltree.

use nfeouro_core::{ns, Error};
use std::collections::HashMap;

/// Find the first descendant element with the given local name and namespace.
pub fn find_element<'a>(
    doc: &'a roxmltree::Document<'a>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    doc.descendants().find(|n| is_named(n, ns_uri, local_name))
}

/// Find the first child element with the given local name and namespace.
pub fn find_child_element<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    parent.children().find(|n| is_named(n, ns_uri, local_name))
}

/// Find all child elements with the given local name and namespace.
pub fn find_child_elements<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    parent
        .children()
        .filter(|n| is_named(n, ns_uri, local_name))
        .collect()
}

/// The element's qualified name exactly as written in the source text.
///
/// roxmltree resolves prefixes away; canonical output and signature
/// splicing both need the prefix back.
pub fn qualified_name<'input>(node: &roxmltree::Node<'_, 'input>) -> Option<&'input str> {
    if !node.is_element() {
        return None;
    }
    let source = node.document().input_text().get(node.range())?;
    let rest = source.strip_prefix('<')?;
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    Some(&rest[..end]).filter(|name| !name.is_empty())
}

fn is_named(node: &roxmltree::Node<'_, '_>, ns_uri: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns_uri
}

/// The element a signature reference points at.
///
/// With `namespace == None` any namespace (including none) matches, which
/// is what plain documents without an `xmlns` need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl ElementTarget {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Match on local name alone.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// `{http://www.sped.fazenda.gov.br/nfeouro}infDAO`
    pub fn inf_dao() -> Self {
        Self::new(ns::NFEOURO, ns::node::INF_DAO)
    }

    pub fn matches(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        if !node.is_element() || node.tag_name().name() != self.local_name {
            return false;
        }
        match &self.namespace {
            None => true,
            Some(uri) => node.tag_name().namespace().unwrap_or("") == uri,
        }
    }

    /// Locate the target below the document element.
    ///
    /// The first matching element must carry an `Id` attribute; the
    /// document element itself is never a candidate.
    pub fn locate<'a>(
        &self,
        doc: &'a roxmltree::Document<'a>,
    ) -> Result<(roxmltree::Node<'a, 'a>, &'a str), Error> {
        let root = doc.root_element();
        let node = root
            .descendants()
            .skip(1)
            .find(|n| self.matches(n))
            .ok_or_else(|| Error::ReferenceNotFound(format!("no <{self}> element")))?;
        let id = node
            .attribute(ns::attr::ID)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::ReferenceNotFound(format!("<{self}> has no Id attribute")))?;
        Ok((node, id))
    }
}

impl Default for ElementTarget {
    fn default() -> Self {
        Self::inf_dao()
    }
}

impl std::fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(uri) => write!(f, "{{{uri}}}{}", self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// `Id` value → element mapping for one parsed document.
///
/// Duplicated `Id` values are remembered so that a reference to one of
/// them is rejected instead of silently resolving to either element.
#[derive(Debug, Default)]
pub struct IdMap {
    ids: HashMap<String, roxmltree::NodeId>,
    duplicates: Vec<String>,
}

impl IdMap {
    pub fn build(doc: &roxmltree::Document<'_>) -> Self {
        let mut map = IdMap::default();
        for node in doc.descendants().filter(|n| n.is_element()) {
            if let Some(val) = node.attribute(ns::attr::ID) {
                if map.ids.insert(val.to_owned(), node.id()).is_some() {
                    map.duplicates.push(val.to_owned());
                }
            }
        }
        map
    }

    /// Resolve an `Id` value in the document the map was built from.
    pub fn resolve<'a>(
        &self,
        doc: &'a roxmltree::Document<'a>,
        id: &str,
    ) -> Result<roxmltree::Node<'a, 'a>, Error> {
        if self.duplicates.iter().any(|d| d == id) {
            return Err(Error::AmbiguousReference(format!(
                "Id {id:?} appears more than once"
            )));
        }
        self.ids
            .get(id)
            .and_then(|nid| doc.get_node(*nid))
            .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))
    }
}

/// Parse a same-document reference (e.g., `#foo` → `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#').filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAO: &str = r#"<DAO xmlns="http://www.sped.fazenda.gov.br/nfeouro"><infDAO Id="DAO1"><ide><nDAO>1</nDAO></ide></infDAO></DAO>"#;

    #[test]
    fn test_locate_inf_dao() {
        let doc = roxmltree::Document::parse(DAO).unwrap();
        let (node, id) = ElementTarget::inf_dao().locate(&doc).unwrap();
        assert_eq!(node.tag_name().name(), "infDAO");
        assert_eq!(id, "DAO1");
    }

    #[test]
    fn test_namespace_must_match() {
        let doc = roxmltree::Document::parse(r#"<DAO><infDAO Id="ID1"/></DAO>"#).unwrap();
        let err = ElementTarget::inf_dao().locate(&doc).unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound(_)));

        let (_, id) = ElementTarget::local("infDAO").locate(&doc).unwrap();
        assert_eq!(id, "ID1");
    }

    #[test]
    fn test_missing_id_is_reference_not_found() {
        let doc = roxmltree::Document::parse(r#"<DAO><infDAO/></DAO>"#).unwrap();
        let err = ElementTarget::local("infDAO").locate(&doc).unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound(_)));
    }

    #[test]
    fn test_root_is_not_a_candidate() {
        let doc = roxmltree::Document::parse(r#"<infDAO Id="ROOT"/>"#).unwrap();
        assert!(ElementTarget::local("infDAO").locate(&doc).is_err());
    }

    #[test]
    fn test_id_map_resolves_and_flags_duplicates() {
        let xml = r#"<r><a Id="x"/><b Id="y"/><c Id="y"/></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let map = IdMap::build(&doc);
        assert_eq!(map.resolve(&doc, "x").unwrap().tag_name().name(), "a");
        assert!(matches!(
            map.resolve(&doc, "y").unwrap_err(),
            Error::AmbiguousReference(_)
        ));
        assert!(matches!(
            map.resolve(&doc, "z").unwrap_err(),
            Error::InvalidUri(_)
        ));
    }

    #[test]
    fn test_qualified_name_keeps_prefix() {
        let xml = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/><plain
            a="1"/></ds:Signature>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let names: Vec<_> = doc
            .descendants()
            .filter_map(|n| qualified_name(&n))
            .collect();
        assert_eq!(names, ["ds:Signature", "ds:SignedInfo", "plain"]);
    }

    #[test]
    fn test_same_document_ref() {
        assert_eq!(parse_same_document_ref("#ID1"), Some("ID1"));
        assert_eq!(parse_same_document_ref("#"), None);
        assert_eq!(parse_same_document_ref("http://x/#a"), None);
    }
}
