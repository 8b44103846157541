use anyhow::Result;
use clap::Parser;
use declmap::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for summaries and completions
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Implement(args) => declmap::implement_run(args, &ctx),
        Commands::Inventory(args) => declmap::inventory_run(args, &ctx),
        Commands::Resolve(args) => declmap::resolve_run(args, &ctx),
        Commands::Merge(args) => declmap::merge_run(args, &ctx),
        Commands::Prune(args) => declmap::prune_run(args, &ctx),
        Commands::Init(args) => declmap::infra::config::init(args, &ctx),
        Commands::Completions(args) => declmap::completion::run(args, &ctx),
    }
}
