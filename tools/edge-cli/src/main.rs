//! Edge CLI - Operator tool for the incremental cache bridge.
//!
//! Commands:
//! - `edge key` - Encode cache keys to storage keys (or decode them)
//! - `edge inspect` - Read an entry and show the headers it would be served with
//! - `edge purge` - Purge tags or paths from the CDN
//! - `edge revalidate` - Revalidate tags (record + purge)
//! - `edge config` - Show or validate configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{ConfigArgs, InspectArgs, KeyArgs, PurgeArgs, RevalidateArgs};

/// Edge CLI - Inspect and invalidate the incremental cache
#[derive(Parser)]
#[command(name = "edge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode cache keys to storage keys
    Key(KeyArgs),

    /// Read a cache entry from the deploy store
    Inspect(InspectArgs),

    /// Purge tags or paths from the CDN
    Purge(PurgeArgs),

    /// Revalidate tags
    Revalidate(RevalidateArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    // Execute command
    let result = match cli.command {
        Commands::Key(args) => commands::key::run(args, &ctx).await,
        Commands::Inspect(args) => commands::inspect::run(args, &ctx).await,
        Commands::Purge(args) => commands::purge::run(args, &ctx).await,
        Commands::Revalidate(args) => commands::revalidate::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        if commands::needs_report(&e) {
            ctx.output.error(&format!("{:#}", e));
        }
        std::process::exit(1);
    }

    Ok(())
}
