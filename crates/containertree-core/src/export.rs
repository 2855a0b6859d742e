//! Rendering views over a tree: nested JSON export and flat path listings.

use serde::Serialize;

use crate::attrs::Attributes;
use crate::engine::{self, NodePath};
use crate::node::Node;

/// Default prefix of the hidden folder a tag branch becomes in [`paths`].
pub const DEFAULT_TAG_PREFIX: &str = ".";

/// Nested pre-order serialization of a subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportNode {
    pub key: String,
    pub name: String,
    pub tags: Vec<String>,
    pub attrs: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Branch tag this node hangs under, for children of a multi-node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub counter: u64,
    pub leaf: bool,
    pub children: Vec<Self>,
}

impl ExportNode {
    #[must_use]
    pub fn from_node(node: &Node) -> Self {
        Self::build(node, None)
    }

    fn build(node: &Node, branch: Option<&str>) -> Self {
        let key = node.label().to_string();
        let name = key.rsplit('/').next().unwrap_or_default().to_string();
        let children = node
            .branches()
            .into_iter()
            .flat_map(|(tag, list)| list.iter().map(move |child| Self::build(child, tag)))
            .collect();
        Self {
            name,
            key,
            tags: node.tags().iter().cloned().collect(),
            attrs: node.attrs().clone(),
            size: node.attrs().size(),
            branch: branch.map(str::to_string),
            counter: node.counter(),
            leaf: node.is_leaf(),
            children,
        }
    }

    /// Number of nodes in this export, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

/// Options for [`paths`].
#[derive(Debug, Clone)]
pub struct PathOptions {
    /// Prefix of the folder inserted for each tag branch.
    pub tag_prefix: String,
    /// Only list leaf nodes.
    pub leaves_only: bool,
    /// Only list nodes with one of these labels. Empty lists everything.
    pub targets: Vec<String>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            leaves_only: false,
            targets: Vec::new(),
        }
    }
}

impl PathOptions {
    #[must_use]
    pub fn with_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn leaves_only(mut self, leaves_only: bool) -> Self {
        self.leaves_only = leaves_only;
        self
    }

    #[must_use]
    pub fn targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    fn keeps(&self, node: &Node) -> bool {
        (!self.leaves_only || node.is_leaf())
            && (self.targets.is_empty() || self.targets.iter().any(|t| t == node.label()))
    }
}

/// Filesystem-like path of `path`, with each tag branch rendered as a
/// `<prefix><tag>` folder.
#[must_use]
pub fn render_path(root: &Node, path: &NodePath, tag_prefix: &str) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(path.len() * 2 + 1);
    if !root.label().is_empty() {
        segments.push(root.label().to_string());
    }
    for hop in path.hops() {
        if let Some(branch) = hop.branch.as_deref().filter(|b| !b.is_empty()) {
            segments.push(format!("{tag_prefix}{branch}"));
        }
        segments.push(hop.label.clone());
    }
    format!("/{}", segments.join("/"))
}

/// Every root-to-node path in pre-order, root included.
#[must_use]
pub fn paths(root: &Node, options: &PathOptions) -> Vec<String> {
    engine::walk(root)
        .filter(|(node, _)| options.keeps(node))
        .map(|(_, path)| render_path(root, &path, &options.tag_prefix))
        .collect()
}
