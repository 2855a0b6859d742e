use anyhow::Result;
use clap::Args;
use containertree_core::PathOptions;
use containertree_core::config::TreeConfig;
use std::io::Write;

use super::{TreeInputs, build_tree};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct PathsArgs {
    #[command(flatten)]
    pub tree: TreeInputs,

    /// Only list leaves.
    #[arg(long)]
    pub leaves_only: bool,
}

/// Execute `ctree paths`.
///
/// # Errors
///
/// Fails when no input could be loaded or output rendering fails.
pub fn run_paths(args: &PathsArgs, output: OutputMode, config: &TreeConfig) -> Result<()> {
    let tag_inputs = args.tree.tag_inputs;
    let tree = build_tree(
        &args.tree.inputs,
        args.tree.kind,
        |input| tag_inputs.then(|| input.to_string()),
        config,
        output,
    )?;
    let paths = tree.paths(&PathOptions::default().leaves_only(args.leaves_only));

    render(output, &paths, |paths, w| {
        for path in paths {
            writeln!(w, "{path}")?;
        }
        Ok(())
    })
}
