//! `ctree generate`: a filesystem tree plus a static HTML view of it.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use containertree_core::config::TreeConfig;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Kind, build_tree};
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render, render_error};
use crate::{sinks, templates};

pub const DATA_FILE: &str = "data.json";
pub const INDEX_FILE: &str = "index.html";

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Image reference, JSON export, or http(s) URL.
    pub image: String,

    /// Folder for the generated files (default: a fresh temp dir).
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Visualization template (see `ctree templates`).
    #[arg(long, default_value = templates::DEFAULT_TEMPLATE)]
    pub template: String,

    /// Print one artifact to stdout instead of writing files.
    #[arg(long = "print", value_enum)]
    pub print: Option<Artifact>,

    /// Overwrite existing files in the output folder.
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Artifact {
    #[value(name = "data.json")]
    Data,
    #[value(name = "index.html")]
    Index,
}

#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub image: String,
    pub webroot: String,
    pub template: String,
    pub nodes: usize,
}

/// Execute `ctree generate`.
///
/// # Errors
///
/// Fails on an unknown template, when nothing could be loaded, or when the
/// output folder already holds generated files and `--force` is not set.
pub fn run_generate(args: &GenerateArgs, output: OutputMode, config: &TreeConfig) -> Result<()> {
    let Some(template) = templates::find(&args.template) else {
        render_error(
            output,
            &CliError::new(format!("unknown template '{}'", args.template)),
        )?;
        anyhow::bail!("unknown template '{}'", args.template);
    };

    let tree = build_tree(
        std::slice::from_ref(&args.image),
        Kind::Files,
        |_| None,
        config,
        output,
    )?;
    let export = tree.export_tree();

    match args.print {
        Some(Artifact::Data) => {
            let text = serde_json::to_string_pretty(&export)?;
            let mut out = std::io::stdout().lock();
            writeln!(out, "{text}")?;
            return Ok(());
        }
        Some(Artifact::Index) => {
            let mut out = std::io::stdout().lock();
            out.write_all(template.html.as_bytes())?;
            return Ok(());
        }
        None => {}
    }

    let webroot = match &args.output {
        Some(dir) => {
            ensure_writable(dir, args.force, output)?;
            dir.clone()
        }
        None => tempfile::Builder::new()
            .prefix("containertree-")
            .tempdir()
            .context("Failed to create a temp dir")?
            .keep(),
    };

    sinks::reported(sinks::write_json(&webroot.join(DATA_FILE), &export), output)?;
    sinks::reported(sinks::write_text(&webroot.join(INDEX_FILE), template.html), output)?;
    tracing::info!(webroot = %webroot.display(), template = template.name, "tree generated");

    let report = GenerateReport {
        image: args.image.clone(),
        webroot: webroot.display().to_string(),
        template: template.name.to_string(),
        nodes: tree.len(),
    };
    render(output, &report, |r, w| {
        if output == OutputMode::Pretty {
            pretty_section(w, "Generated")?;
            pretty_kv(w, "image", &r.image)?;
            pretty_kv(w, "template", &r.template)?;
            pretty_kv(w, "nodes", r.nodes.to_string())?;
            pretty_kv(w, "webroot", &r.webroot)
        } else {
            writeln!(w, "{}", r.webroot)
        }
    })
}

fn ensure_writable(dir: &Path, force: bool, output: OutputMode) -> Result<()> {
    let taken = [DATA_FILE, INDEX_FILE]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists());
    if let (Some(path), false) = (taken, force) {
        render_error(
            output,
            &CliError {
                message: format!("{} already exists", path.display()),
                suggestion: Some("pass --force to overwrite".to_string()),
                error_code: None,
            },
        )?;
        anyhow::bail!("{} already exists", path.display());
    }
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}
