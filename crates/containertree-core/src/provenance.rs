//! Image provenance graph.
//!
//! # Overview
//!
//! The root is the `scratch` sentinel. Every image is a multi-node labelled
//! `namespace/repo`; its children are partitioned by the tag of the parent
//! image they derive from. `update("continuumio/miniconda3",
//! "library/debian:9")` files miniconda3 under debian's `9` branch and gives
//! miniconda3 an (empty) `latest` branch of its own.
//!
//! # Design
//!
//! Labels are unique across the whole graph: an image appears once, under
//! the base it was most recently observed deriving from. An auxiliary index
//! maps every label to its [`NodePath`]; every mutation re-derives the index
//! entries of the subtree it moved, so `find` never walks the tree.
//!
//! A base image hangs directly off the root only if its label starts with
//! the configured first-level prefix (`library` by default). A pair whose
//! base is neither present nor admissible at the root is an *orphan*: the
//! tree is left untouched, `update` returns `Ok(false)`, and the pair is kept
//! as a pending edge until [`ProvenanceGraph::retry_orphans`] attaches it.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::attrs::Attributes;
use crate::config::CollectionConfig;
use crate::dockerfile::{self, FromLine};
use crate::engine::{self, Matcher, NodePath, Similarity};
use crate::error::ErrorCode;
use crate::export::{self, ExportNode, PathOptions};
use crate::node::Node;
use crate::uri::{ImageRef, UriError};

/// Label of the root sentinel.
pub const ROOT_LABEL: &str = "scratch";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvenanceError {
    #[error(transparent)]
    Unparseable(#[from] UriError),

    #[error("'{0}' is a Dockerfile; only the base image may be read from one")]
    DockerfileImage(String),

    #[error("cannot read Dockerfile {path}: {reason}")]
    DockerfileUnreadable { path: String, reason: String },

    #[error("Dockerfile {0} has no FROM instruction")]
    MissingFrom(String),

    #[error("Dockerfile {path} is a multi-stage build (FROM ... AS {stage})")]
    MultiStage { path: String, stage: String },

    #[error("image {0} cannot derive from itself")]
    SelfReference(String),

    #[error("linking {image} under {base} would make {image} its own ancestor")]
    Cycle { image: String, base: String },

    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),
}

impl ProvenanceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unparseable(_) => ErrorCode::UnparseableReference,
            Self::DockerfileUnreadable { .. } => ErrorCode::InputUnavailable,
            Self::DockerfileImage(_)
            | Self::MissingFrom(_)
            | Self::MultiStage { .. }
            | Self::SelfReference(_) => ErrorCode::InvalidPairing,
            Self::Cycle { .. } => ErrorCode::CycleDetected,
            Self::InvalidPattern(_) => ErrorCode::InvalidPattern,
        }
    }
}

/// A pair that could not yet be attached to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEdge {
    pub image: String,
    pub base: String,
    pub tag: Option<String>,
}

/// The multi-version image tree.
#[derive(Debug, Clone)]
pub struct ProvenanceGraph {
    config: CollectionConfig,
    root: Node,
    index: HashMap<String, NodePath>,
    pending: Vec<PendingEdge>,
}

impl Default for ProvenanceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvenanceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CollectionConfig::default())
    }

    #[must_use]
    pub fn with_config(config: CollectionConfig) -> Self {
        Self {
            config,
            root: Node::new(ROOT_LABEL, Attributes::named(ROOT_LABEL)),
            index: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// A graph admitting any namespace (or only `first_level`-prefixed ones)
    /// at the first level.
    #[must_use]
    pub fn with_first_level(first_level: &str) -> Self {
        Self::with_config(CollectionConfig {
            first_level: first_level.to_string(),
            ..CollectionConfig::default()
        })
    }

    #[must_use]
    pub const fn config(&self) -> &CollectionConfig {
        &self.config
    }

    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len() + 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Pairs waiting for an ancestor.
    #[must_use]
    pub fn pending(&self) -> &[PendingEdge] {
        &self.pending
    }

    // -- parsing ------------------------------------------------------------

    fn parse(&self, text: &str) -> Result<ImageRef, UriError> {
        ImageRef::parse_with(
            text,
            &self.config.default_namespace,
            &self.config.default_tag,
        )
    }

    /// Resolve `base` to an image reference string, reading the first `FROM`
    /// when it names a Dockerfile.
    fn resolve_base(base: &str) -> Result<String, ProvenanceError> {
        if !dockerfile::is_dockerfile_path(base) {
            return Ok(base.to_string());
        }
        let from = dockerfile::read_from(Path::new(base)).map_err(|err| {
            ProvenanceError::DockerfileUnreadable {
                path: base.to_string(),
                reason: err.to_string(),
            }
        })?;
        match from {
            None => Err(ProvenanceError::MissingFrom(base.to_string())),
            Some(FromLine {
                stage: Some(stage), ..
            }) => Err(ProvenanceError::MultiStage {
                path: base.to_string(),
                stage,
            }),
            Some(FromLine { image, .. }) => {
                debug!(dockerfile = base, from = %image, "resolved base from Dockerfile");
                Ok(image)
            }
        }
    }

    fn admits_first_level(&self, label: &str) -> bool {
        label.starts_with(self.config.first_level.as_str())
    }

    // -- update -------------------------------------------------------------

    /// Record that `image` derives from `base`, attaching `tag` (a concrete
    /// container id) to the image node.
    ///
    /// Returns `Ok(true)` when the pair is reachable from the root and
    /// `Ok(false)` when it was kept as a pending orphan. Nothing is mutated
    /// on error.
    ///
    /// # Errors
    ///
    /// Fails when either reference is unparseable, when `image` is a
    /// Dockerfile, when the base Dockerfile is unreadable, multi-stage or has
    /// no `FROM`, or when the edge would create a cycle.
    pub fn update(
        &mut self,
        image: &str,
        base: &str,
        tag: Option<&str>,
    ) -> Result<bool, ProvenanceError> {
        if dockerfile::is_dockerfile_path(image) {
            warn!(image, "refusing a Dockerfile as the derived image");
            return Err(ProvenanceError::DockerfileImage(image.to_string()));
        }
        let base_text = Self::resolve_base(base)?;
        let image_ref = self.parse(image)?;
        let base_ref = self.parse(&base_text)?;

        if image_ref.node_uri() == base_ref.node_uri() {
            return Err(ProvenanceError::SelfReference(image_ref.node_uri()));
        }

        if image_ref.is_scratch() {
            let attached = self.link_to_root(&base_ref, tag);
            if attached {
                self.forget_pending(&base_ref.node_uri());
            }
            return Ok(attached);
        }
        if base_ref.is_scratch() {
            let attached = self.link_to_root(&image_ref, tag);
            if attached {
                self.forget_pending(&image_ref.node_uri());
            }
            return Ok(attached);
        }

        let attached = self.link(&image_ref, &base_ref, tag)?;
        let edge = PendingEdge {
            image: image.to_string(),
            base: base_text,
            tag: tag.map(str::to_string),
        };
        if attached {
            self.forget_pending(&image_ref.node_uri());
        } else {
            info!(image = %edge.image, base = %edge.base, "pair is orphaned until its base is present");
            if !self.pending.contains(&edge) {
                self.pending.push(edge);
            }
        }
        Ok(attached)
    }

    /// Drop every pending pair for `label`. A newer observation supersedes
    /// any base it was waiting on.
    fn forget_pending(&mut self, label: &str) {
        let kept: Vec<PendingEdge> = self
            .pending
            .iter()
            .filter(|edge| {
                !self
                    .parse(&edge.image)
                    .is_ok_and(|image| image.node_uri() == label)
            })
            .cloned()
            .collect();
        self.pending = kept;
    }

    /// Re-apply every pending pair. Returns how many attached.
    pub fn retry_orphans(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut attached = 0;
        for edge in pending {
            match self.update(&edge.image, &edge.base, edge.tag.as_deref()) {
                Ok(true) => attached += 1,
                Ok(false) => {}
                Err(err) => warn!(image = %edge.image, base = %edge.base, %err, "dropping pending pair"),
            }
        }
        attached
    }

    /// `FROM scratch`: the image hangs directly off the root.
    fn link_to_root(&mut self, image: &ImageRef, tag: Option<&str>) -> bool {
        let label = image.node_uri();
        let mut node = match self.index.get(&label).cloned() {
            Some(path) if path.len() == 1 => {
                let Some(node) = engine::resolve_mut(&mut self.root, &path) else {
                    return false;
                };
                node.bump();
                Self::observe(node, image, tag);
                return true;
            }
            Some(path) => {
                let Some(mut node) = self.take(&path) else {
                    return false;
                };
                node.bump();
                node
            }
            None => {
                let mut node = Node::multi(label.as_str(), Attributes::named(label.as_str()));
                node.set_leaf(true);
                node
            }
        };

        Self::observe(&mut node, image, tag);
        self.root.attach(None, node);
        self.reindex(&NodePath::root().child(None, &label));
        true
    }

    /// Link `image` under `base`. `Ok(false)` when the base cannot reach the
    /// root; the tree is untouched in that case.
    fn link(
        &mut self,
        image: &ImageRef,
        base: &ImageRef,
        tag: Option<&str>,
    ) -> Result<bool, ProvenanceError> {
        let image_label = image.node_uri();
        let base_label = base.node_uri();
        let branch = base.repo_tag.as_str();

        let image_path = self.index.get(&image_label).cloned();
        let base_path = self.index.get(&base_label).cloned();

        // Pure validation first; nothing below may fail after mutating.
        match &base_path {
            Some(path) if path.passes_through(&image_label) => {
                return Err(ProvenanceError::Cycle {
                    image: image_label,
                    base: base_label,
                });
            }
            Some(_) => {}
            None if self.admits_first_level(&base_label) => {}
            None => {
                debug!(base = %base_label, first_level = %self.config.first_level, "base rejected at first level");
                return Ok(false);
            }
        }

        // Duplicate observation: already filed under this base and branch.
        if let (Some(ipath), Some(bpath)) = (&image_path, &base_path) {
            let expected = bpath.child(Some(branch), &image_label);
            if *ipath == expected {
                if let Some(base_node) = engine::resolve_mut(&mut self.root, bpath) {
                    base_node.bump();
                }
                if let Some(node) = engine::resolve_mut(&mut self.root, ipath) {
                    node.bump();
                    Self::observe(node, image, tag);
                }
                return Ok(true);
            }
        }

        // Detach the image from wherever it sits.
        let mut image_node = match &image_path {
            Some(path) => {
                let Some(mut node) = self.take(path) else {
                    return Ok(false);
                };
                node.bump();
                debug!(image = %image_label, base = %base_label, "re-parenting image");
                node
            }
            None => {
                let mut node =
                    Node::multi(image_label.as_str(), Attributes::named(image_label.as_str()));
                node.set_leaf(true);
                node
            }
        };
        Self::observe(&mut image_node, image, tag);

        // Paths are label based and the base is not under the image, so
        // detaching the image leaves the base's path valid.
        let base_path = if let Some(path) = self.index.get(&base_label).cloned() {
            if let Some(base_node) = engine::resolve_mut(&mut self.root, &path) {
                base_node.bump();
            }
            path
        } else {
            let mut base_node =
                Node::multi(base_label.as_str(), Attributes::named(base_label.as_str()));
            base_node.ensure_branch(branch);
            self.root.attach(None, base_node);
            let path = NodePath::root().child(None, &base_label);
            self.index.insert(base_label.clone(), path.clone());
            path
        };

        let Some(base_node) = engine::resolve_mut(&mut self.root, &base_path) else {
            return Ok(false);
        };
        base_node.set_leaf(false);
        base_node.attach(Some(branch), image_node);
        self.reindex(&base_path.child(Some(branch), &image_label));
        Ok(true)
    }

    /// Record an observation of `image` on its node.
    fn observe(node: &mut Node, image: &ImageRef, tag: Option<&str>) {
        node.ensure_branch(&image.repo_tag);
        if let Some(tag) = tag {
            node.add_tag(tag);
        }
    }

    /// Detach the subtree at `path` and drop its index entries.
    fn take(&mut self, path: &NodePath) -> Option<Node> {
        let node = engine::detach(&mut self.root, path)?;
        for descendant in engine::preorder(&node) {
            self.index.remove(descendant.label());
        }
        Some(node)
    }

    /// Re-derive index entries for the subtree now living at `path`.
    fn reindex(&mut self, path: &NodePath) {
        let Some(node) = engine::resolve(&self.root, path) else {
            return;
        };
        for (descendant, relative) in engine::walk(node) {
            let mut full = path.clone();
            for hop in relative.hops() {
                full = full.child(hop.branch.as_deref(), &hop.label);
            }
            self.index.insert(descendant.label().to_string(), full);
        }
    }

    // -- queries ------------------------------------------------------------

    /// Index key for `name`: the label itself, or the node uri of `name`
    /// parsed as an image reference.
    fn key_for(&self, name: &str) -> Option<String> {
        if self.index.contains_key(name) {
            return Some(name.to_string());
        }
        let label = self.parse(name).ok()?.node_uri();
        self.index.contains_key(&label).then_some(label)
    }

    fn locate(&self, name: &str) -> Option<NodePath> {
        if name == ROOT_LABEL {
            return Some(NodePath::root());
        }
        self.key_for(name).and_then(|key| self.index.get(&key).cloned())
    }

    /// Find a node by `namespace/repo` label (or any reference parsing to it).
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.locate(name)
            .and_then(|path| engine::resolve(&self.root, &path))
    }

    /// Root-first chain ending at the named image.
    #[must_use]
    pub fn trace(&self, name: &str) -> Option<Vec<&Node>> {
        self.locate(name)
            .and_then(|path| engine::trace(&self.root, &path))
    }

    /// `scratch|<ns>|<tag>|...|<name>` for an indexed node.
    #[must_use]
    pub fn index_path(&self, name: &str) -> Option<String> {
        self.locate(name).map(|path| path.render(ROOT_LABEL))
    }

    /// Counter of the named node, `0` when absent.
    #[must_use]
    pub fn get_count(&self, name: &str) -> u64 {
        self.find(name).map_or(0, Node::counter)
    }

    /// Nodes whose label matches the regular expression, in pre-order.
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError::InvalidPattern`] for a bad expression.
    pub fn search(&self, pattern: &str, limit: Option<usize>) -> Result<Vec<&Node>, ProvenanceError> {
        let matcher =
            Matcher::regex(pattern).map_err(|err| ProvenanceError::InvalidPattern(err.to_string()))?;
        Ok(engine::search(&self.root, &matcher, limit))
    }

    /// Remove a node, or with `tag` only that branch of it. A node left with
    /// no branches is removed entirely. Naming the root returns a copy of it.
    pub fn remove(&mut self, name: &str, tag: Option<&str>) -> Option<Node> {
        let path = self.locate(name)?;
        if path.is_empty() {
            return Some(self.root.clone());
        }

        let Some(branch) = tag else {
            let removed = self.take(&path)?;
            debug!(image = removed.label(), "removed image subtree");
            return Some(removed);
        };

        let node = engine::resolve_mut(&mut self.root, &path)?;
        let dropped = node.remove_branch(branch)?;
        let now_empty = node.branch_tags().is_empty();
        let snapshot = node.clone();
        for child in &dropped {
            for descendant in engine::preorder(child) {
                self.index.remove(descendant.label());
            }
        }

        if now_empty {
            return self.take(&path);
        }
        Some(snapshot)
    }

    /// Every node except the root, in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        engine::preorder(&self.root).skip(1)
    }

    #[must_use]
    pub fn get_nodes(&self) -> Vec<&Node> {
        self.nodes().collect()
    }

    #[must_use]
    pub fn similarity_score<S: AsRef<str>>(&self, tags: &[S]) -> Similarity {
        engine::similarity_score(&self.root, tags)
    }

    /// Paths using the configured tag prefix unless `options` overrides it.
    #[must_use]
    pub fn paths(&self, options: &PathOptions) -> Vec<String> {
        export::paths(&self.root, options)
    }

    /// Paths with default options and the configured tag prefix.
    #[must_use]
    pub fn get_paths(&self) -> Vec<String> {
        self.paths(&PathOptions::default().with_tag_prefix(self.config.tag_prefix.as_str()))
    }

    #[must_use]
    pub fn export_tree(&self) -> ExportNode {
        ExportNode::from_node(&self.root)
    }
}

impl<'a> IntoIterator for &'a ProvenanceGraph {
    type Item = &'a Node;
    type IntoIter = std::iter::Skip<engine::Preorder<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        engine::preorder(&self.root).skip(1)
    }
}

impl fmt::Display for ProvenanceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProvenanceGraph<{}>", self.len())
    }
}
