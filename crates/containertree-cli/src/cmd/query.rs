//! `ctree query`: build a tree and look things up in it.

use anyhow::Result;
use clap::Args;
use containertree_core::Node;
use containertree_core::config::TreeConfig;
use serde::Serialize;
use std::io::Write;

use super::{TreeInputs, build_tree};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub tree: TreeInputs,

    /// Find one node (a path for file trees, a name for package trees).
    #[arg(long)]
    pub find: Option<String>,

    /// Print the chain from the root to a node.
    #[arg(long)]
    pub trace: Option<String>,

    /// List nodes whose name contains this text.
    #[arg(long)]
    pub search: Option<String>,

    /// Maximum number of search results.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Report how many inputs passed through a node.
    #[arg(long)]
    pub count: Option<String>,
}

/// One node as reported on the command line.
#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub label: String,
    pub name: String,
    pub counter: u64,
    pub leaf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub tags: Vec<String>,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            label: node.label().to_string(),
            name: node.name().to_string(),
            counter: node.counter(),
            leaf: node.is_leaf(),
            size: node.attrs().size(),
            tags: node.tags().iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
    pub tree: String,
    pub nodes: usize,
    /// `null` when the node was not found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub find: Option<Option<NodeSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Execute `ctree query`.
///
/// # Errors
///
/// Fails when no input could be loaded or output rendering fails.
pub fn run_query(args: &QueryArgs, output: OutputMode, config: &TreeConfig) -> Result<()> {
    let tag_inputs = args.tree.tag_inputs;
    let tree = build_tree(
        &args.tree.inputs,
        args.tree.kind,
        |input| tag_inputs.then(|| input.to_string()),
        config,
        output,
    )?;

    let report = QueryReport {
        tree: tree.to_string(),
        nodes: tree.len(),
        find: args
            .find
            .as_deref()
            .map(|name| tree.find(name).map(NodeSummary::from)),
        trace: args.trace.as_deref().map(|name| {
            tree.trace(name)
                .unwrap_or_default()
                .into_iter()
                .map(|node| node.name().to_string())
                .collect()
        }),
        search: args.search.as_deref().map(|text| {
            tree.search(text, args.limit)
                .into_iter()
                .map(|node| node.name().to_string())
                .collect()
        }),
        count: args.count.as_deref().map(|name| tree.get_count(name)),
    };

    render_mode(output, &report, render_text, render_pretty)
}

fn render_text(report: &QueryReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}", report.tree)?;
    if let Some(found) = &report.find {
        match found {
            Some(node) => writeln!(w, "find\t{}\t{}", node.name, node.counter)?,
            None => writeln!(w, "find\t-")?,
        }
    }
    if let Some(trace) = &report.trace {
        writeln!(w, "trace\t{}", trace.join(" -> "))?;
    }
    if let Some(hits) = &report.search {
        for hit in hits {
            writeln!(w, "search\t{hit}")?;
        }
    }
    if let Some(count) = report.count {
        writeln!(w, "count\t{count}")?;
    }
    Ok(())
}

fn render_pretty(report: &QueryReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &report.tree)?;
    if let Some(found) = &report.find {
        match found {
            Some(node) => {
                pretty_kv(w, "find", &node.name)?;
                pretty_kv(w, "counter", node.counter.to_string())?;
                pretty_kv(w, "leaf", node.leaf.to_string())?;
                if let Some(size) = node.size {
                    pretty_kv(w, "size", size.to_string())?;
                }
                if !node.tags.is_empty() {
                    pretty_kv(w, "tags", node.tags.join(", "))?;
                }
            }
            None => pretty_kv(w, "find", "not found")?,
        }
    }
    if let Some(trace) = &report.trace {
        if trace.is_empty() {
            pretty_kv(w, "trace", "not found")?;
        } else {
            pretty_kv(w, "trace", trace.join(" -> "))?;
        }
    }
    if let Some(hits) = &report.search {
        pretty_kv(w, "search", format!("{} hit(s)", hits.len()))?;
        for hit in hits {
            writeln!(w, "  {hit}")?;
        }
    }
    if let Some(count) = report.count {
        pretty_kv(w, "count", count.to_string())?;
    }
    Ok(())
}
