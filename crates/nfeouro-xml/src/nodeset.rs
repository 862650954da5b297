#![forbid(unsafe_code)]

//! Node sets selected by a signature reference.
//!
//! A `NodeSet` holds the `NodeId`s of a roxmltree document that take part
//! in canonicalization. The enveloped-signature transform is expressed as
//! removing the `Signature` subtree from the referenced tree.

use roxmltree::{Document, Node, NodeId};
use std::collections::HashSet;

/// A set of XML document nodes identified by `NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of the document except comments (`URI=""` semantics).
    pub fn all_without_comments(doc: &Document<'_>) -> Self {
        let mut set = Self::new();
        collect_subtree(doc.root(), &mut set.nodes, false);
        set
    }

    /// The subtree rooted at `root`, comments excluded.
    pub fn tree_without_comments(root: Node<'_, '_>) -> Self {
        let mut set = Self::new();
        collect_subtree(root, &mut set.nodes, false);
        set
    }

    /// The subtree rooted at `root`, comments included.
    pub fn tree_with_comments(root: Node<'_, '_>) -> Self {
        let mut set = Self::new();
        collect_subtree(root, &mut set.nodes, true);
        set
    }

    pub fn contains(&self, node: &Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn insert(&mut self, node: &Node<'_, '_>) {
        self.nodes.insert(node.id());
    }

    /// Drop `root` and all of its descendants from the set.
    pub fn remove_subtree(&mut self, root: Node<'_, '_>) {
        for n in root.descendants() {
            self.nodes.remove(&n.id());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn collect_subtree(node: Node<'_, '_>, set: &mut HashSet<NodeId>, include_comments: bool) {
    for n in node.descendants() {
        if include_comments || !n.is_comment() {
            set.insert(n.id());
        }
    }
}
