//! `ctree collection`: the image provenance graph from a list of
//! `image base [tag]` pairs.

use anyhow::{Context, Result};
use clap::Args;
use containertree_core::config::TreeConfig;
use containertree_core::error::ErrorCode;
use containertree_core::{PathOptions, ProvenanceGraph};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};
use crate::sinks;

#[derive(Args, Debug)]
pub struct CollectionArgs {
    /// JSON list of `[image, base]` / `[image, base, tag]`, or one
    /// whitespace-separated pair per line.
    #[arg(long, value_name = "FILE")]
    pub pairs: PathBuf,

    /// Namespace prefix a base needs to hang off `scratch` ("" accepts all).
    #[arg(long)]
    pub first_level: Option<String>,

    /// Retry passes over orphaned pairs.
    #[arg(long, default_value_t = 1)]
    pub passes: usize,

    /// List the graph as paths.
    #[arg(long)]
    pub paths: bool,

    /// With --paths, only list leaves.
    #[arg(long)]
    pub leaves_only: bool,

    /// With --paths, folder prefix for tag branches.
    #[arg(long)]
    pub tag_prefix: Option<String>,

    /// With --paths, only list these images.
    #[arg(long = "target", value_name = "NAME")]
    pub targets: Vec<String>,

    /// Write the graph as nested JSON.
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub image: String,
    pub base: String,
    pub tag: Option<String>,
}

impl Pair {
    fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        match fields {
            [image, base] => Some(Self {
                image: image.as_ref().to_string(),
                base: base.as_ref().to_string(),
                tag: None,
            }),
            [image, base, tag] => Some(Self {
                image: image.as_ref().to_string(),
                base: base.as_ref().to_string(),
                tag: Some(tag.as_ref().to_string()),
            }),
            _ => None,
        }
    }
}

/// Parse a pairs file. JSON when it starts with `[`, otherwise one pair per
/// line with `#` comments. Malformed entries are skipped with a warning.
///
/// # Errors
///
/// Fails only for text that starts like JSON but does not parse as a list
/// of string lists.
pub fn parse_pairs(text: &str) -> Result<Vec<Pair>> {
    if text.trim_start().starts_with('[') {
        let rows: Vec<Vec<String>> =
            serde_json::from_str(text).context("Failed to parse pairs as JSON")?;
        return Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let pair = Pair::from_fields(row);
                if pair.is_none() {
                    warn!(entry = i, "skipping pair without 2 or 3 fields");
                }
                pair
            })
            .collect());
    }

    Ok(text
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let pair = Pair::from_fields(&fields);
            if pair.is_none() {
                warn!(line = i + 1, "skipping pair without 2 or 3 fields");
            }
            pair
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct Rejected {
    pub image: String,
    pub base: String,
    pub error_code: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionReport {
    pub nodes: usize,
    pub attached: usize,
    pub orphaned: usize,
    /// Pairs still waiting on their base after every retry pass.
    pub orphans: Vec<Rejected>,
    pub rejected: Vec<Rejected>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
}

/// Execute `ctree collection`.
///
/// # Errors
///
/// Fails when the pairs file is unreadable or malformed, or the export
/// cannot be written.
pub fn run_collection(args: &CollectionArgs, output: OutputMode, config: &TreeConfig) -> Result<()> {
    let text = match std::fs::read_to_string(&args.pairs) {
        Ok(text) => text,
        Err(err) => {
            let message = format!("Failed to read {}: {err}", args.pairs.display());
            render_error(
                output,
                &CliError::coded(message.clone(), ErrorCode::InputUnavailable),
            )?;
            anyhow::bail!(message);
        }
    };
    let pairs = parse_pairs(&text)?;

    let mut settings = config.collection.clone();
    if let Some(first_level) = &args.first_level {
        settings.first_level.clone_from(first_level);
    }
    if let Some(prefix) = &args.tag_prefix {
        settings.tag_prefix.clone_from(prefix);
    }
    let mut graph = ProvenanceGraph::with_config(settings);

    let mut attached = 0;
    let mut rejected = Vec::new();
    for pair in &pairs {
        match graph.update(&pair.image, &pair.base, pair.tag.as_deref()) {
            Ok(true) => attached += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(image = %pair.image, base = %pair.base, %err, "pair rejected");
                rejected.push(Rejected {
                    image: pair.image.clone(),
                    base: pair.base.clone(),
                    error_code: err.code().code().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
    for _ in 0..args.passes {
        if graph.pending().is_empty() {
            break;
        }
        attached += graph.retry_orphans();
    }

    let paths = args.paths.then(|| {
        graph.paths(&PathOptions {
            tag_prefix: graph.config().tag_prefix.clone(),
            leaves_only: args.leaves_only,
            targets: args.targets.clone(),
        })
    });

    if let Some(path) = &args.export {
        sinks::reported(sinks::write_json(path, &graph.export_tree()), output)?;
    }

    let orphans: Vec<Rejected> = graph
        .pending()
        .iter()
        .map(|edge| Rejected {
            image: edge.image.clone(),
            base: edge.base.clone(),
            error_code: ErrorCode::OrphanedInsert.code().to_string(),
            reason: ErrorCode::OrphanedInsert.message().to_string(),
        })
        .collect();

    let report = CollectionReport {
        nodes: graph.len(),
        attached,
        orphaned: orphans.len(),
        orphans,
        rejected,
        paths,
        export: args.export.as_ref().map(|p| p.display().to_string()),
    };
    render_mode(output, &report, render_text, render_pretty)
}

fn render_text(report: &CollectionReport, w: &mut dyn Write) -> std::io::Result<()> {
    if let Some(paths) = &report.paths {
        for path in paths {
            writeln!(w, "{path}")?;
        }
        return Ok(());
    }
    writeln!(
        w,
        "nodes={} attached={} orphaned={} rejected={}",
        report.nodes,
        report.attached,
        report.orphaned,
        report.rejected.len()
    )
}

fn render_pretty(report: &CollectionReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Collection")?;
    pretty_kv(w, "nodes", report.nodes.to_string())?;
    pretty_kv(w, "attached", report.attached.to_string())?;
    pretty_kv(w, "orphaned", report.orphaned.to_string())?;
    for orphan in &report.orphans {
        writeln!(w, "  {} <- {}: [{}]", orphan.image, orphan.base, orphan.error_code)?;
    }
    pretty_kv(w, "rejected", report.rejected.len().to_string())?;
    for rejected in &report.rejected {
        writeln!(
            w,
            "  {} <- {}: [{}] {}",
            rejected.image, rejected.base, rejected.error_code, rejected.reason
        )?;
    }
    if let Some(export) = &report.export {
        pretty_kv(w, "export", export)?;
    }
    if let Some(paths) = &report.paths {
        writeln!(w)?;
        pretty_section(w, "Paths")?;
        for path in paths {
            writeln!(w, "{path}")?;
        }
    }
    Ok(())
}
