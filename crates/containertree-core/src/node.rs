//! Tree vertices.
//!
//! A [`Node`] is a labelled vertex with attributes, a provenance tag set, a
//! leaf flag, a repetition counter, and children. Children come in two
//! shapes:
//!
//! - [`Children::List`]: an ordered sequence, used by filesystem and package
//!   tries and by the root of the provenance graph.
//! - [`Children::Tagged`]: ordered sequences keyed by a branch tag (an image
//!   tag such as `latest` or `1.0`), used by namespace nodes of the
//!   provenance graph. This is the "multi-node" shape.
//!
//! The traversal interface ([`Node::children`], [`Node::branches`]) hides the
//! difference, so the engine algorithms never branch on the shape.

use std::collections::{BTreeMap, BTreeSet};

use crate::attrs::Attributes;

/// Child storage for a node.
#[derive(Debug, Clone, PartialEq)]
enum Children {
    List(Vec<Node>),
    Tagged(BTreeMap<String, Vec<Node>>),
}

/// A vertex of a container tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    label: String,
    attrs: Attributes,
    tags: BTreeSet<String>,
    leaf: bool,
    counter: u64,
    children: Children,
}

impl Node {
    /// A node whose children form a single ordered list.
    #[must_use]
    pub fn new(label: impl Into<String>, attrs: Attributes) -> Self {
        Self::with_children(label.into(), attrs, Children::List(Vec::new()))
    }

    /// A multi-node: children are partitioned by branch tag.
    #[must_use]
    pub fn multi(label: impl Into<String>, attrs: Attributes) -> Self {
        Self::with_children(label.into(), attrs, Children::Tagged(BTreeMap::new()))
    }

    const fn with_children(label: String, attrs: Attributes, children: Children) -> Self {
        Self {
            label,
            attrs,
            tags: BTreeSet::new(),
            leaf: false,
            counter: 1,
            children,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The `name` attribute, falling back to the label.
    #[must_use]
    pub fn name(&self) -> &str {
        self.attrs.name().unwrap_or(&self.label)
    }

    #[must_use]
    pub const fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub const fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Add a provenance tag. Returns `false` if it was already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// `true` when every supplied tag is present.
    #[must_use]
    pub fn has_tags<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().all(|t| self.tags.contains(t.as_ref()))
    }

    /// `true` when at least one supplied tag is present.
    #[must_use]
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.tags.contains(t.as_ref()))
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.leaf
    }

    pub const fn set_leaf(&mut self, leaf: bool) {
        self.leaf = leaf;
    }

    #[must_use]
    pub const fn counter(&self) -> u64 {
        self.counter
    }

    /// Record one more insertion that resolved to this node.
    pub const fn bump(&mut self) {
        self.counter = self.counter.saturating_add(1);
    }

    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self.children, Children::Tagged(_))
    }

    /// All children in order; for a multi-node, branch by branch.
    pub fn children(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        match &self.children {
            Children::List(list) => Box::new(list.iter()),
            Children::Tagged(map) => Box::new(map.values().flatten()),
        }
    }

    /// Child lists together with their branch tag (`None` for a list node).
    #[must_use]
    pub fn branches(&self) -> Vec<(Option<&str>, &[Self])> {
        match &self.children {
            Children::List(list) => vec![(None, list.as_slice())],
            Children::Tagged(map) => map
                .iter()
                .map(|(tag, list)| (Some(tag.as_str()), list.as_slice()))
                .collect(),
        }
    }

    /// Branch tags of a multi-node, in order. Empty for a list node.
    #[must_use]
    pub fn branch_tags(&self) -> Vec<&str> {
        match &self.children {
            Children::List(_) => Vec::new(),
            Children::Tagged(map) => map.keys().map(String::as_str).collect(),
        }
    }

    /// The children filed under `tag` on a multi-node.
    #[must_use]
    pub fn branch(&self, tag: &str) -> Option<&[Self]> {
        match &self.children {
            Children::List(_) => None,
            Children::Tagged(map) => map.get(tag).map(Vec::as_slice),
        }
    }

    #[must_use]
    pub fn has_branch(&self, tag: &str) -> bool {
        self.branch(tag).is_some()
    }

    /// Make sure a (possibly empty) branch exists. No-op on a list node.
    pub fn ensure_branch(&mut self, tag: &str) {
        if let Children::Tagged(map) = &mut self.children {
            map.entry(tag.to_string()).or_default();
        }
    }

    /// Drop a whole branch from a multi-node.
    pub fn remove_branch(&mut self, tag: &str) -> Option<Vec<Self>> {
        match &mut self.children {
            Children::List(_) => None,
            Children::Tagged(map) => map.remove(tag),
        }
    }

    /// The list a child would be filed in, if it exists.
    #[must_use]
    pub fn child_list(&self, branch: Option<&str>) -> Option<&[Self]> {
        match (&self.children, branch) {
            (Children::List(list), None) => Some(list),
            (Children::Tagged(map), Some(tag)) => map.get(tag).map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn child_list_mut(&mut self, branch: Option<&str>) -> Option<&mut Vec<Self>> {
        match (&mut self.children, branch) {
            (Children::List(list), None) => Some(list),
            (Children::Tagged(map), Some(tag)) => map.get_mut(tag),
            _ => None,
        }
    }

    /// First direct child carrying `label`, searching every branch.
    #[must_use]
    pub fn child(&self, label: &str) -> Option<&Self> {
        self.children().find(|c| c.label == label)
    }

    /// Append a child. A list node ignores `branch`; untagged children of a
    /// multi-node are filed under the empty branch.
    pub fn attach(&mut self, branch: Option<&str>, child: Self) {
        match &mut self.children {
            Children::List(list) => list.push(child),
            Children::Tagged(map) => map
                .entry(branch.unwrap_or_default().to_string())
                .or_default()
                .push(child),
        }
    }

    /// Remove the child carrying `label` from the given list.
    pub fn detach(&mut self, branch: Option<&str>, label: &str) -> Option<Self> {
        let list = self.child_list_mut(branch)?;
        let pos = list.iter().position(|c| c.label == label)?;
        Some(list.remove(pos))
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        self.children().next().is_some()
    }

    /// Number of nodes in the subtree rooted here, including this one.
    #[must_use]
    pub fn subtree_size(&self) -> usize {
        1 + self.children().map(Self::subtree_size).sum::<usize>()
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_multi() {
            write!(f, "MultiNode<{}>", self.label)
        } else {
            write!(f, "Node<{}>", self.label)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leafy(label: &str) -> Node {
        let mut node = Node::new(label, Attributes::named(label));
        node.set_leaf(true);
        node
    }

    #[test]
    fn new_node_defaults() {
        let node = Node::new("etc", Attributes::named("/etc"));
        assert_eq!(node.label(), "etc");
        assert_eq!(node.name(), "/etc");
        assert_eq!(node.counter(), 1);
        assert!(!node.is_leaf());
        assert!(!node.is_multi());
        assert!(node.tags().is_empty());
    }

    #[test]
    fn name_falls_back_to_label() {
        let node = Node::new("scratch", Attributes::new());
        assert_eq!(node.name(), "scratch");
    }

    #[test]
    fn tag_membership() {
        let mut node = Node::new("etc", Attributes::new());
        assert!(node.add_tag("a"));
        assert!(!node.add_tag("a"));
        node.add_tag("b");
        assert!(node.has_tags(&["a", "b"]));
        assert!(!node.has_tags(&["a", "c"]));
        assert!(node.has_any_tag(&["c", "b"]));
        assert!(!node.has_any_tag(&["c"]));
    }

    #[test]
    fn multi_children_iterate_across_branches() {
        let mut ns = Node::multi("continuumio/miniconda3", Attributes::new());
        ns.attach(Some("latest"), leafy("a/one"));
        ns.attach(Some("1.0"), leafy("a/two"));
        ns.attach(Some("latest"), leafy("a/three"));

        let labels: Vec<&str> = ns.children().map(Node::label).collect();
        // BTreeMap order: "1.0" before "latest".
        assert_eq!(labels, ["a/two", "a/one", "a/three"]);
        assert_eq!(ns.branch_tags(), ["1.0", "latest"]);
        assert_eq!(ns.branch("latest").map(<[Node]>::len), Some(2));
        assert!(ns.branch("missing").is_none());
    }

    #[test]
    fn ensure_branch_creates_empty_list() {
        let mut ns = Node::multi("library/debian", Attributes::new());
        ns.ensure_branch("latest");
        assert_eq!(ns.branch("latest").map(<[Node]>::len), Some(0));
        assert!(!ns.has_children());
    }

    #[test]
    fn list_node_has_no_branches() {
        let mut node = Node::new("", Attributes::new());
        node.ensure_branch("latest");
        assert!(node.branch_tags().is_empty());
        assert!(node.branch("latest").is_none());
        assert_eq!(node.branches().len(), 1);
    }

    #[test]
    fn detach_removes_only_named_child() {
        let mut node = Node::new("", Attributes::new());
        node.attach(None, leafy("etc"));
        node.attach(None, leafy("usr"));
        let removed = node.detach(None, "etc").expect("present");
        assert_eq!(removed.label(), "etc");
        assert_eq!(node.children().count(), 1);
        assert!(node.detach(None, "etc").is_none());
    }

    #[test]
    fn detach_respects_branch() {
        let mut ns = Node::multi("library/debian", Attributes::new());
        ns.attach(Some("latest"), leafy("x/y"));
        assert!(ns.detach(Some("1.0"), "x/y").is_none());
        assert!(ns.detach(None, "x/y").is_none());
        assert!(ns.detach(Some("latest"), "x/y").is_some());
        assert_eq!(ns.branch("latest").map(<[Node]>::len), Some(0));
    }

    #[test]
    fn subtree_size_counts_self() {
        let mut root = Node::new("", Attributes::new());
        let mut etc = Node::new("etc", Attributes::new());
        etc.attach(None, leafy("ssl"));
        root.attach(None, etc);
        assert_eq!(root.subtree_size(), 3);
    }

    #[test]
    fn display_names_shape() {
        assert_eq!(Node::new("etc", Attributes::new()).to_string(), "Node<etc>");
        assert_eq!(
            Node::multi("library/debian", Attributes::new()).to_string(),
            "MultiNode<library/debian>"
        );
    }
}
