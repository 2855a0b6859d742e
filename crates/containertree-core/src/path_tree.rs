//! Filesystem and package tries.
//!
//! # Overview
//!
//! A [`PathTree`] folds `{Name, ...}` records into a list-children trie. The
//! four [`Flavour`]s differ in two places only:
//!
//! - which part of the payload holds the records ([`Flavour::analyze_type`],
//!   fed to [`record::extract`]), and
//! - how a record becomes a chain of labels ([`KeyScheme`]): filesystem paths
//!   split on the separator, packages become `[name, version]`.
//!
//! The fold itself ([`PathTree::insert_record`]) is shared.
//!
//! # Counters and tags
//!
//! Creating a node starts its counter at 1; every later insertion that walks
//! through an existing node bumps it once. A tag supplied with an insertion
//! lands on every node of the path, root included.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::attrs::Attributes;
use crate::engine::{self, Matcher, NodePath, Similarity};
use crate::export::{self, ExportNode, PathOptions};
use crate::node::Node;
use crate::record::{self, AnalyzeType, Record};

/// Default path separator for filesystem flavours.
pub const DEFAULT_SEPARATOR: &str = "/";

// ---------------------------------------------------------------------------
// Flavours
// ---------------------------------------------------------------------------

/// How a record's name maps onto trie labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    /// Split on the separator; one node per non-empty segment.
    Filesystem,
    /// Package name under the root, version under the package.
    Packages,
}

/// The kind of tree being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavour {
    /// A plain list of file records.
    Files,
    /// The `File` section of a `container-diff` export.
    DiffFiles,
    /// The `Pip` section of a `container-diff` export.
    Pip,
    /// The `Apt` section of a `container-diff` export.
    Apt,
}

impl Flavour {
    #[must_use]
    pub const fn analyze_type(self) -> Option<AnalyzeType> {
        match self {
            Self::Files => None,
            Self::DiffFiles => Some(AnalyzeType::File),
            Self::Pip => Some(AnalyzeType::Pip),
            Self::Apt => Some(AnalyzeType::Apt),
        }
    }

    #[must_use]
    pub const fn key_scheme(self) -> KeyScheme {
        match self {
            Self::Files | Self::DiffFiles => KeyScheme::Filesystem,
            Self::Pip | Self::Apt => KeyScheme::Packages,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::DiffFiles => "diff-files",
            Self::Pip => "pip",
            Self::Apt => "apt",
        }
    }
}

impl fmt::Display for Flavour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PathTree
// ---------------------------------------------------------------------------

/// A filesystem or package trie.
#[derive(Debug, Clone)]
pub struct PathTree {
    flavour: Flavour,
    separator: String,
    root: Node,
    count: usize,
}

impl PathTree {
    #[must_use]
    pub fn new(flavour: Flavour) -> Self {
        Self::with_separator(flavour, DEFAULT_SEPARATOR)
    }

    /// A tree splitting filesystem names on `separator` instead of `/`.
    /// An empty separator falls back to `/`.
    #[must_use]
    pub fn with_separator(flavour: Flavour, separator: &str) -> Self {
        let separator = if separator.is_empty() {
            DEFAULT_SEPARATOR
        } else {
            separator
        };
        let mut root_attrs = Attributes::named(separator);
        root_attrs.set_size(0);
        Self {
            flavour,
            separator: separator.to_string(),
            root: Node::new("", root_attrs),
            count: 1,
        }
    }

    /// Build a tree from one payload.
    #[must_use]
    pub fn from_payload(flavour: Flavour, payload: &Value, tag: Option<&str>) -> Self {
        let mut tree = Self::new(flavour);
        tree.update(payload, tag);
        tree
    }

    #[must_use]
    pub const fn flavour(&self) -> Flavour {
        self.flavour
    }

    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Number of nodes, root included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// `true` when only the root exists.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 1
    }

    // -- insertion ----------------------------------------------------------

    /// Fold another payload into the tree. Returns the number of records
    /// inserted.
    pub fn update(&mut self, payload: &Value, tag: Option<&str>) -> usize {
        let records = record::extract(payload, self.flavour.analyze_type());
        self.insert_records(records, tag)
    }

    /// Fold already extracted records. Returns the number inserted.
    pub fn insert_records(
        &mut self,
        records: impl IntoIterator<Item = Record>,
        tag: Option<&str>,
    ) -> usize {
        let mut inserted = 0;
        for record in records {
            if self.insert_record(record, tag) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Insert a single name with optional extra attributes.
    pub fn insert(&mut self, name: &str, attrs: Option<&Attributes>, tag: Option<&str>) -> bool {
        let mut record = Record::new(name);
        if let Some(extra) = attrs {
            record.attrs.merge(extra);
            record.attrs.set_name(name);
        }
        self.insert_record(record, tag)
    }

    /// Fold one record into the trie. Returns `false` if the record yields
    /// no labels (an empty path, or a package without a version).
    pub fn insert_record(&mut self, record: Record, tag: Option<&str>) -> bool {
        let Some(chain) = self.label_chain(record) else {
            return false;
        };

        let mut created = 0_usize;
        let mut node = &mut self.root;
        if let Some(tag) = tag {
            node.add_tag(tag);
        }
        for (label, attrs) in chain {
            let Some(children) = node.child_list_mut(None) else {
                return false;
            };
            let pos = if let Some(pos) = children.iter().position(|c| c.label() == label) {
                children[pos].bump();
                pos
            } else {
                children.push(Node::new(label, attrs));
                created += 1;
                children.len() - 1
            };
            node = &mut children[pos];
            if let Some(tag) = tag {
                node.add_tag(tag);
            }
        }
        node.set_leaf(true);
        self.count += created;
        true
    }

    /// Labels (with the attributes a newly created node gets) for a record.
    fn label_chain(&self, record: Record) -> Option<Vec<(String, Attributes)>> {
        match self.flavour.key_scheme() {
            KeyScheme::Filesystem => {
                let segments: Vec<&str> = record
                    .name
                    .split(self.separator.as_str())
                    .filter(|s| !s.is_empty())
                    .collect();
                if segments.is_empty() {
                    debug!(name = %record.name, "record has no path segments");
                    return None;
                }
                let last = segments.len() - 1;
                let mut prefix = String::new();
                let mut chain = Vec::with_capacity(segments.len());
                for (i, segment) in segments.iter().enumerate() {
                    prefix.push_str(&self.separator);
                    prefix.push_str(segment);
                    let attrs = if i == last {
                        let mut attrs = record.attrs.clone();
                        attrs.set_name(prefix.clone());
                        attrs
                    } else {
                        Attributes::named(prefix.clone())
                    };
                    chain.push(((*segment).to_string(), attrs));
                }
                Some(chain)
            }
            KeyScheme::Packages => {
                let Some(version) = record.version().map(str::to_string) else {
                    warn!(package = %record.name, "skipping package with no Version");
                    return None;
                };
                let package = Attributes::named(record.name.clone());
                Some(vec![(record.name, package), (version, record.attrs)])
            }
        }
    }

    // -- lookup -------------------------------------------------------------

    /// Path mode (filesystem) or label mode (packages).
    fn locate(&self, name: &str) -> Option<NodePath> {
        if name.is_empty() {
            return None;
        }
        match self.flavour.key_scheme() {
            KeyScheme::Filesystem => {
                let segments: Vec<&str> = name
                    .split(self.separator.as_str())
                    .filter(|s| !s.is_empty())
                    .collect();
                engine::locate_segments(&self.root, &segments)
            }
            KeyScheme::Packages => engine::locate_label(&self.root, name),
        }
    }

    /// Find a node: by absolute path for filesystem trees (`/etc/ssl`; the
    /// separator alone names the root), by label for package trees.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.locate(name)
            .and_then(|path| engine::resolve(&self.root, &path))
    }

    /// Root-first chain ending at the named node.
    #[must_use]
    pub fn trace(&self, name: &str) -> Option<Vec<&Node>> {
        self.locate(name)
            .and_then(|path| engine::trace(&self.root, &path))
    }

    /// Counter of the named node, `0` when absent.
    #[must_use]
    pub fn get_count(&self, name: &str) -> u64 {
        self.find(name).map_or(0, Node::counter)
    }

    /// Nodes whose label contains `text`, in pre-order, at most `limit`.
    #[must_use]
    pub fn search(&self, text: &str, limit: Option<usize>) -> Vec<&Node> {
        engine::search(&self.root, &Matcher::literal(text), limit)
    }

    #[must_use]
    pub fn search_with(&self, matcher: &Matcher, limit: Option<usize>) -> Vec<&Node> {
        engine::search(&self.root, matcher, limit)
    }

    /// Detach and return the named subtree. Naming the root returns a copy of
    /// it and leaves the tree untouched.
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let path = self.locate(name)?;
        if path.is_empty() {
            return Some(self.root.clone());
        }
        let removed = engine::detach(&mut self.root, &path)?;
        self.count -= removed.subtree_size();
        Some(removed)
    }

    /// Every node except the root, in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        engine::preorder(&self.root).skip(1)
    }

    #[must_use]
    pub fn similarity_score<S: AsRef<str>>(&self, tags: &[S]) -> Similarity {
        engine::similarity_score(&self.root, tags)
    }

    #[must_use]
    pub fn paths(&self, options: &PathOptions) -> Vec<String> {
        export::paths(&self.root, options)
    }

    #[must_use]
    pub fn export_tree(&self) -> ExportNode {
        ExportNode::from_node(&self.root)
    }

    // -- vectors ------------------------------------------------------------

    /// Presence table: one row per tag, one column per package (or
    /// `package-vversion` with [`VectorOptions::include_versions`]).
    #[must_use]
    pub fn export_vectors(&self, options: &VectorOptions) -> FeatureTable {
        let depth = if options.include_versions { 2 } else { 1 };
        let mut table = FeatureTable::default();

        for (node, path) in engine::walk(&self.root) {
            if path.len() != depth {
                continue;
            }
            let column = match path.hops() {
                [package, _version] if options.include_versions => {
                    format!("{}-v{}", package.label, node.label())
                }
                _ => node.label().to_string(),
            };
            for tag in node.tags().iter().filter(|t| options.accepts(t)) {
                table.mark(tag, &column);
            }
        }
        table
    }
}

impl fmt::Display for PathTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathTree<{}, {}>", self.flavour, self.count)
    }
}

// ---------------------------------------------------------------------------
// Vector export
// ---------------------------------------------------------------------------

/// Tag filters for [`PathTree::export_vectors`].
#[derive(Debug, Clone, Default)]
pub struct VectorOptions {
    /// Keep only these tags. `None` keeps all.
    pub include: Option<Vec<String>>,
    /// Drop these tags.
    pub skip: Vec<String>,
    /// Keep only tags matching this pattern.
    pub pattern: Option<Regex>,
    /// Use version-level columns.
    pub include_versions: bool,
}

impl VectorOptions {
    /// Set the tag filter pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error for an invalid pattern.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    fn accepts(&self, tag: &str) -> bool {
        self.include
            .as_ref()
            .is_none_or(|keep| keep.iter().any(|k| k == tag))
            && !self.skip.iter().any(|s| s == tag)
            && self.pattern.as_ref().is_none_or(|re| re.is_match(tag))
    }
}

/// Rows are tags, columns are features; a cell is present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: BTreeMap<String, BTreeSet<String>>,
}

impl FeatureTable {
    fn mark(&mut self, row: &str, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self.rows
            .entry(row.to_string())
            .or_default()
            .insert(column.to_string());
    }

    /// Columns in first-seen (pre-order) order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row names, sorted.
    pub fn rows(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, row: &str, column: &str) -> bool {
        self.rows.get(row).is_some_and(|cols| cols.contains(column))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tab-separated rendering with a header row; cells are `1` or `0`.
    #[must_use]
    pub fn to_tsv(&self) -> String {
        let mut out = String::from("tag");
        for column in &self.columns {
            out.push('\t');
            out.push_str(column);
        }
        out.push('\n');
        for (row, present) in &self.rows {
            out.push_str(row);
            for column in &self.columns {
                out.push('\t');
                out.push(if present.contains(column) { '1' } else { '0' });
            }
            out.push('\n');
        }
        out
    }
}
