//! `ctree vectors`: package presence per container.

use anyhow::Result;
use clap::Args;
use containertree_core::VectorOptions;
use containertree_core::config::TreeConfig;
use containertree_core::error::ErrorCode;
use std::io::Write;

use super::{Kind, build_tree};
use crate::output::{CliError, OutputMode, render_error, render_mode};

#[derive(Args, Debug)]
pub struct VectorsArgs {
    /// Package exports; each is tagged with its own reference.
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<String>,

    /// `pip` or `apt`.
    #[arg(long, value_enum, default_value_t = Kind::Pip)]
    pub kind: Kind,

    /// Only keep these container tags.
    #[arg(long = "include", value_name = "TAG")]
    pub include: Vec<String>,

    /// Drop these container tags.
    #[arg(long = "skip", value_name = "TAG")]
    pub skip: Vec<String>,

    /// Only keep container tags matching this regular expression.
    #[arg(long)]
    pub regex: Option<String>,

    /// One column per package version instead of per package.
    #[arg(long)]
    pub versions: bool,
}

/// Execute `ctree vectors`.
///
/// # Errors
///
/// Fails for a non-package kind, an invalid `--regex`, or when no input
/// could be loaded.
pub fn run_vectors(args: &VectorsArgs, output: OutputMode, config: &TreeConfig) -> Result<()> {
    if !matches!(args.kind, Kind::Pip | Kind::Apt) {
        render_error(
            output,
            &CliError::new("vectors are only defined for --kind pip or --kind apt"),
        )?;
        anyhow::bail!("vectors need a package tree");
    }

    let mut options = VectorOptions {
        include: (!args.include.is_empty()).then(|| args.include.clone()),
        skip: args.skip.clone(),
        pattern: None,
        include_versions: args.versions,
    };
    if let Some(pattern) = &args.regex {
        options = match options.with_pattern(pattern) {
            Ok(options) => options,
            Err(err) => {
                render_error(
                    output,
                    &CliError::coded(format!("invalid --regex: {err}"), ErrorCode::InvalidPattern),
                )?;
                anyhow::bail!("invalid --regex");
            }
        };
    }

    let tree = build_tree(
        &args.inputs,
        args.kind,
        |input| Some(input.to_string()),
        config,
        output,
    )?;
    let table = tree.export_vectors(&options);

    render_mode(
        output,
        &table,
        |t, w| w.write_all(t.to_tsv().as_bytes()),
        |t, w| {
            if t.is_empty() {
                return writeln!(w, "no containers matched");
            }
            w.write_all(t.to_tsv().as_bytes())
        },
    )
}
