//! Label-based traversal primitives shared by every tree flavour.
//!
//! # Addressing
//!
//! A node is addressed by a [`NodePath`]: the sequence of `(branch, label)`
//! hops from the root. Labels are unique within one child list, so a hop
//! identifies exactly one child; the branch is `None` when the parent keeps
//! a plain list. Paths survive sibling insertions and removals, which is why
//! the provenance index stores them instead of positions.
//!
//! # Traversal
//!
//! Every traversal is a pre-order walk (node before children, children in
//! stored order) driven by an explicit stack, so deep or adversarial trees
//! cannot overflow the call stack.

use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::node::Node;

// ---------------------------------------------------------------------------
// NodePath
// ---------------------------------------------------------------------------

/// One step from a parent to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hop {
    pub branch: Option<String>,
    pub label: String,
}

/// Root-relative address of a node. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    hops: Vec<Hop>,
}

impl NodePath {
    #[must_use]
    pub const fn root() -> Self {
        Self { hops: Vec::new() }
    }

    #[must_use]
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// The path of a child of this node.
    #[must_use]
    pub fn child(&self, branch: Option<&str>, label: &str) -> Self {
        let mut hops = self.hops.clone();
        hops.push(Hop {
            branch: branch.map(str::to_string),
            label: label.to_string(),
        });
        Self { hops }
    }

    /// The parent path and the final hop, or `None` for the root.
    #[must_use]
    pub fn split_last(&self) -> Option<(Self, &Hop)> {
        let (last, rest) = self.hops.split_last()?;
        Some((Self { hops: rest.to_vec() }, last))
    }

    #[must_use]
    pub fn last(&self) -> Option<&Hop> {
        self.hops.last()
    }

    /// `true` when a node labelled `label` sits on this path (root excluded).
    #[must_use]
    pub fn passes_through(&self, label: &str) -> bool {
        self.hops.iter().any(|h| h.label == label)
    }

    /// `root|label1|branch2|label2|...`: every hop contributes its branch tag
    /// (when the parent is tagged) followed by its label.
    #[must_use]
    pub fn render(&self, root_label: &str) -> String {
        let mut out = root_label.to_string();
        for hop in &self.hops {
            if let Some(branch) = &hop.branch {
                out.push('|');
                out.push_str(branch);
            }
            out.push('|');
            out.push_str(&hop.label);
        }
        out
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(""))
    }
}

// ---------------------------------------------------------------------------
// Walking
// ---------------------------------------------------------------------------

/// Pre-order iterator yielding each node with its path.
pub struct Walk<'a> {
    stack: Vec<(&'a Node, NodePath)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (&'a Node, NodePath);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, path) = self.stack.pop()?;
        let mut pending: Vec<(&'a Node, NodePath)> = Vec::new();
        for (branch, list) in node.branches() {
            for child in list {
                pending.push((child, path.child(branch, child.label())));
            }
        }
        self.stack.extend(pending.into_iter().rev());
        Some((node, path))
    }
}

/// Walk the tree rooted at `root` in pre-order.
#[must_use]
pub fn walk(root: &Node) -> Walk<'_> {
    Walk {
        stack: vec![(root, NodePath::root())],
    }
}

/// Pre-order iterator over the nodes only.
pub struct Preorder<'a> {
    walk: Walk<'a>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.next().map(|(node, _)| node)
    }
}

#[must_use]
pub fn preorder(root: &Node) -> Preorder<'_> {
    Preorder { walk: walk(root) }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Path of the first node, in pre-order, satisfying `pred`.
pub fn locate(root: &Node, pred: impl Fn(&Node) -> bool) -> Option<NodePath> {
    walk(root).find(|(node, _)| pred(node)).map(|(_, path)| path)
}

/// Path of the first node whose label equals `label`.
#[must_use]
pub fn locate_label(root: &Node, label: &str) -> Option<NodePath> {
    if label.is_empty() && !root.label().is_empty() {
        return None;
    }
    locate(root, |n| n.label() == label)
}

/// Descend list children segment by segment. An empty segment list is the
/// root.
#[must_use]
pub fn locate_segments<S: AsRef<str>>(root: &Node, segments: &[S]) -> Option<NodePath> {
    let mut node = root;
    let mut path = NodePath::root();
    for segment in segments {
        let segment = segment.as_ref();
        let child = node.child_list(None)?.iter().find(|c| c.label() == segment)?;
        path = path.child(None, segment);
        node = child;
    }
    Some(path)
}

/// The node at `path`, if every hop still exists.
#[must_use]
pub fn resolve<'a>(root: &'a Node, path: &NodePath) -> Option<&'a Node> {
    let mut node = root;
    for hop in path.hops() {
        node = node
            .child_list(hop.branch.as_deref())?
            .iter()
            .find(|c| c.label() == hop.label)?;
    }
    Some(node)
}

pub fn resolve_mut<'a>(root: &'a mut Node, path: &NodePath) -> Option<&'a mut Node> {
    let mut node = root;
    for hop in path.hops() {
        node = node
            .child_list_mut(hop.branch.as_deref())?
            .iter_mut()
            .find(|c| c.label() == hop.label)?;
    }
    Some(node)
}

/// Root-first chain of nodes ending at (and including) the node at `path`.
#[must_use]
pub fn trace<'a>(root: &'a Node, path: &NodePath) -> Option<Vec<&'a Node>> {
    let mut chain = Vec::with_capacity(path.len() + 1);
    let mut node = root;
    chain.push(node);
    for hop in path.hops() {
        node = node
            .child_list(hop.branch.as_deref())?
            .iter()
            .find(|c| c.label() == hop.label)?;
        chain.push(node);
    }
    Some(chain)
}

/// Detach the subtree at `path` and hand it to the caller. The root cannot
/// be detached.
pub fn detach(root: &mut Node, path: &NodePath) -> Option<Node> {
    let (parent_path, last) = path.split_last()?;
    let parent = resolve_mut(root, &parent_path)?;
    parent.detach(last.branch.as_deref(), &last.label)
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// How `search` compares a label.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Literal substring containment.
    Literal(String),
    /// Regular-expression search anywhere in the label.
    Pattern(Regex),
}

impl Matcher {
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Compile a regular expression matcher.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid pattern.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    #[must_use]
    pub fn is_match(&self, label: &str) -> bool {
        match self {
            Self::Literal(text) => label.contains(text.as_str()),
            Self::Pattern(re) => re.is_match(label),
        }
    }
}

/// Every node whose label matches, in pre-order, stopping after `limit`
/// matches.
#[must_use]
pub fn search<'a>(root: &'a Node, matcher: &Matcher, limit: Option<usize>) -> Vec<&'a Node> {
    let matches = preorder(root).filter(|n| matcher.is_match(n.label()));
    match limit {
        Some(limit) => matches.take(limit).collect(),
        None => matches.collect(),
    }
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// Node-level tag overlap.
///
/// `same` counts nodes carrying every requested tag, `diff` the nodes missing
/// at least one, `total` the nodes carrying at least one. `score` is
/// `same / total`, or `0` when no node carries any of the tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Similarity {
    pub tags: Vec<String>,
    pub total: usize,
    pub same: usize,
    pub diff: usize,
    pub score: f64,
}

/// Compute the tag overlap over the whole tree.
#[must_use]
pub fn similarity_score<S: AsRef<str>>(root: &Node, tags: &[S]) -> Similarity {
    let (mut total, mut same, mut diff) = (0_usize, 0_usize, 0_usize);
    for node in preorder(root) {
        if node.has_tags(tags) {
            same += 1;
        } else {
            diff += 1;
        }
        if node.has_any_tag(tags) {
            total += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let score = if total > 0 {
        same as f64 / total as f64
    } else {
        0.0
    };

    Similarity {
        tags: tags.iter().map(|t| t.as_ref().to_string()).collect(),
        total,
        same,
        diff,
        score,
    }
}
