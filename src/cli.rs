use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::lookup::ConflictPolicy;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "declmap")]
#[command(
    about = "Resolve function ownership across C translation units and merge dataflow into a file dependency graph"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress summaries and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing outputs
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the Implement relation from a structural dependency dump
    Implement(ImplementArgs),

    /// Build the per-file function inventory from a taint result map
    Inventory(InventoryArgs),

    /// Classify every inventoried function into a resolution tier
    Resolve(ResolveArgs),

    /// Merge dataflow observations into a dependency graph as file edges
    Merge(MergeArgs),

    /// Drop co-change attributes at or below a threshold
    Prune(PruneArgs),

    /// Initialize a declmap.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct ImplementArgs {
    /// Structural dependency dump (JSON with cells[].details[])
    pub input: PathBuf,

    /// Output implement map
    #[arg(short, long, default_value = "implement_map.json")]
    pub output: PathBuf,
}

#[derive(Debug, Parser)]
pub struct InventoryArgs {
    /// Taint analysis YAML containing a result-map section
    pub input: PathBuf,

    /// Output inventory file
    #[arg(short, long, default_value = "inventory.json")]
    pub output: PathBuf,
}

#[derive(Debug, Parser)]
pub struct ResolveArgs {
    /// Function inventory produced by `declmap inventory`
    pub inventory: PathBuf,

    /// Implement map produced by `declmap implement`
    pub implement_map: PathBuf,

    /// Source tree root that implementation paths are relative to
    #[arg(long, default_value = ".")]
    pub src_root: PathBuf,

    /// Output declaration map
    #[arg(short, long, default_value = "declmap.json")]
    pub output: PathBuf,

    /// Override the lookup conflict policy from config
    #[arg(long, value_enum)]
    pub conflict_policy: Option<ConflictPolicy>,
}

#[derive(Debug, Parser)]
pub struct MergeArgs {
    /// Taint analysis YAML containing a result-map section
    pub taint: PathBuf,

    /// Dependency graph JSON (variables + cells)
    pub graph: PathBuf,

    /// Declaration map produced by `declmap resolve`
    pub declmap: PathBuf,

    /// Output graph path
    #[arg(short, long, default_value = "merged.json")]
    pub output: PathBuf,

    /// Write collected diagnostics as a JSON array to this path
    #[arg(long)]
    pub errors: Option<PathBuf>,

    /// Edge attribute name for emitted edges (defaults to config)
    #[arg(long)]
    pub attribute: Option<String>,
}

#[derive(Debug, Parser)]
pub struct PruneArgs {
    /// Dependency graph JSON (variables + cells)
    pub input: PathBuf,

    /// Output graph path
    #[arg(short, long, default_value = "pruned.json")]
    pub output: PathBuf,

    /// Keep co-change values strictly above this threshold (defaults to config)
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
