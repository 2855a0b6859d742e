pub mod collection;
pub mod completions;
pub mod generate;
pub mod paths;
pub mod query;
pub mod similarity;
pub mod templates;
pub mod vectors;

use anyhow::Result;
use clap::{Args, ValueEnum};
use containertree_core::config::TreeConfig;
use containertree_core::{Flavour, PathTree, record};
use serde_json::Value;
use tracing::{debug, info};

use crate::output::{CliError, OutputMode, render_error};
use crate::source;

/// Tree flavour as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    /// A plain list of file records.
    Files,
    /// The File section of a container-diff export.
    DiffFiles,
    /// Python packages from a container-diff export.
    Pip,
    /// Debian packages from a container-diff export.
    Apt,
}

impl From<Kind> for Flavour {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Files => Self::Files,
            Kind::DiffFiles => Self::DiffFiles,
            Kind::Pip => Self::Pip,
            Kind::Apt => Self::Apt,
        }
    }
}

/// Inputs shared by every tree-building command.
#[derive(Args, Debug)]
pub struct TreeInputs {
    /// JSON files, http(s) URLs, or image references (analysed with container-diff).
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<String>,

    /// Which tree to build from each input.
    #[arg(long, value_enum, default_value_t = Kind::Files)]
    pub kind: Kind,

    /// Tag every node with the input it came from.
    #[arg(long)]
    pub tag_inputs: bool,
}

/// The flavour a payload is folded with. A plain-files request handed a
/// `container-diff` export reads its File section instead.
fn effective_flavour(kind: Kind, payload: &Value) -> Flavour {
    match kind {
        Kind::Files if record::is_diff_export(payload) => Flavour::DiffFiles,
        other => other.into(),
    }
}

/// Load every input into one tree. An input that fails to load is reported
/// and skipped; the command only fails when nothing loads.
pub fn build_tree(
    inputs: &[String],
    kind: Kind,
    tag_for: impl Fn(&str) -> Option<String>,
    config: &TreeConfig,
    output: OutputMode,
) -> Result<PathTree> {
    let mut tree: Option<PathTree> = None;

    for input in inputs {
        let flavour = tree.as_ref().map_or_else(|| Flavour::from(kind), PathTree::flavour);
        let mut payload = match source::load(input, flavour.analyze_type()) {
            Ok(payload) => payload,
            Err(err) => {
                render_error(output, &CliError::coded(err.to_string(), err.code()))?;
                continue;
            }
        };

        let tree = tree.get_or_insert_with(|| {
            PathTree::with_separator(effective_flavour(kind, &payload), &config.files.separator)
        });
        if matches!(tree.flavour(), Flavour::Files | Flavour::DiffFiles) {
            let filled = source::fill_sizes(&mut payload, tree.flavour().analyze_type());
            debug!(input, filled, "sizes filled from local files");
        }
        let tag = tag_for(input);
        let inserted = tree.update(&payload, tag.as_deref());
        info!(input, inserted, flavour = %tree.flavour(), "input loaded");
    }

    tree.ok_or_else(|| anyhow::anyhow!("no input could be loaded"))
}
