#![forbid(unsafe_code)]

mod cmd;
mod output;
mod sinks;
mod source;
mod templates;

use clap::{CommandFactory, Parser, Subcommand};
use containertree_core::config::load_config;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ctree: filesystem, package, and image-provenance trees for containers",
    long_about = None
)]
struct Cli {
    /// Output format.
    #[arg(long, value_enum, global = true)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Config file (default: ./containertree.toml, then the user config dir).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Visualize",
        about = "Generate a container tree and its HTML view",
        long_about = "Build a filesystem tree for one image (or exported JSON) and write data.json plus index.html into an output folder.",
        after_help = "EXAMPLES:\n    # Analyse an image with container-diff\n    ctree generate vanessa/salad\n\n    # From an exported file list, into a chosen folder\n    ctree generate files.json --output site/\n\n    # Print the tree data instead of writing files\n    ctree generate files.json --print data.json"
    )]
    Generate(cmd::generate::GenerateArgs),

    #[command(
        next_help_heading = "Visualize",
        about = "List the built-in visualization templates"
    )]
    Templates,

    #[command(
        next_help_heading = "Trees",
        about = "Query a file or package tree",
        after_help = "EXAMPLES:\n    # Find a file and its counter\n    ctree query files.json --find /etc/ssl\n\n    # Package tree from a container-diff export\n    ctree query export.json --kind pip --trace certifi\n\n    # Search names, at most five hits\n    ctree query a.json b.json --tag-inputs --search ssl -n 5"
    )]
    Query(cmd::query::QueryArgs),

    #[command(
        next_help_heading = "Trees",
        about = "Compare containers by shared nodes",
        after_help = "EXAMPLES:\n    # How much of the filesystem two containers share\n    ctree similarity a.json b.json\n\n    # Compare pip packages\n    ctree similarity a.json b.json --kind pip --format json"
    )]
    Similarity(cmd::similarity::SimilarityArgs),

    #[command(
        next_help_heading = "Trees",
        about = "Package presence table, one row per container",
        after_help = "EXAMPLES:\n    # TSV of pip packages per container\n    ctree vectors a.json b.json --kind pip\n\n    # Version-level columns for some containers\n    ctree vectors *.json --kind apt --versions --regex '^prod/'"
    )]
    Vectors(cmd::vectors::VectorsArgs),

    #[command(
        next_help_heading = "Trees",
        about = "List every node of a tree as a path"
    )]
    Paths(cmd::paths::PathsArgs),

    #[command(
        next_help_heading = "Provenance",
        about = "Build the image provenance graph from image/base pairs",
        after_help = "EXAMPLES:\n    # Summary of a pairs file\n    ctree collection --pairs pairs.txt\n\n    # Accept every namespace and list leaf images as paths\n    ctree collection --pairs pairs.json --first-level '' --paths --leaves-only\n\n    # Export the graph for visualization\n    ctree collection --pairs pairs.txt --export graph.json"
    )]
    Collection(cmd::collection::CollectionArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    ctree completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CTREE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "containertree=debug,ctree=debug,info"
        } else {
            "containertree=info,warn"
        })
    });

    let format = env::var("CTREE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cwd = env::current_dir()?;
    let config = match load_config(cli.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(err) => {
            let output = resolve_output_mode(cli.format, cli.json, None);
            render_error(
                output,
                &CliError::coded(
                    format!("{err:#}"),
                    containertree_core::error::ErrorCode::ConfigParseError,
                ),
            )?;
            return Err(err);
        }
    };
    let output = resolve_output_mode(cli.format, cli.json, config.output.as_deref());

    match cli.command {
        Commands::Generate(ref args) => cmd::generate::run_generate(args, output, &config),
        Commands::Templates => cmd::templates::run_templates(output),
        Commands::Query(ref args) => cmd::query::run_query(args, output, &config),
        Commands::Similarity(ref args) => cmd::similarity::run_similarity(args, output, &config),
        Commands::Vectors(ref args) => cmd::vectors::run_vectors(args, output, &config),
        Commands::Paths(ref args) => cmd::paths::run_paths(args, output, &config),
        Commands::Collection(ref args) => cmd::collection::run_collection(args, output, &config),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["ctree", "templates", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Templates));
    }

    #[test]
    fn format_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["ctree", "--format", "text", "paths", "a.json"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn query_kind_is_kebab_case() {
        let cli = Cli::parse_from(["ctree", "query", "x.json", "--kind", "diff-files"]);
        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.tree.kind, cmd::Kind::DiffFiles);
    }

    #[test]
    fn similarity_needs_two_inputs() {
        assert!(Cli::try_parse_from(["ctree", "similarity", "a.json"]).is_err());
    }

    #[test]
    fn generate_print_accepts_file_names() {
        let cli = Cli::parse_from(["ctree", "generate", "img", "--print", "index.html"]);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.print, Some(cmd::generate::Artifact::Index));
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
