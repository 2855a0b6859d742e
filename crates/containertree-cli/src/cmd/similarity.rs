use anyhow::Result;
use clap::Args;
use containertree_core::config::TreeConfig;
use std::io::Write;

use super::{Kind, build_tree};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct SimilarityArgs {
    /// Two or more inputs; each is tagged with its own reference.
    #[arg(required = true, num_args = 2.., value_name = "INPUT")]
    pub inputs: Vec<String>,

    #[arg(long, value_enum, default_value_t = Kind::Files)]
    pub kind: Kind,
}

/// Execute `ctree similarity`.
///
/// # Errors
///
/// Fails when no input could be loaded or output rendering fails.
pub fn run_similarity(args: &SimilarityArgs, output: OutputMode, config: &TreeConfig) -> Result<()> {
    let tree = build_tree(
        &args.inputs,
        args.kind,
        |input| Some(input.to_string()),
        config,
        output,
    )?;
    let score = tree.similarity_score(&args.inputs);

    render_mode(
        output,
        &score,
        |s, w| writeln!(w, "{}\t{}\t{}\t{:.4}", s.total, s.same, s.diff, s.score),
        |s, w| {
            pretty_section(w, "Similarity")?;
            for tag in &s.tags {
                writeln!(w, "  {tag}")?;
            }
            pretty_kv(w, "total", s.total.to_string())?;
            pretty_kv(w, "same", s.same.to_string())?;
            pretty_kv(w, "diff", s.diff.to_string())?;
            pretty_kv(w, "score", format!("{:.4}", s.score))
        },
    )
}
