mod commands;
mod setup;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing_subscriber::{EnvFilter, fmt, prelude::*},
};

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Hybrid search over markdown memory files")]
struct Cli {
    /// Path to mnemo.toml (defaults to the platform config dir).
    #[arg(long, global = true, env = "MNEMO_CONFIG")]
    config: Option<PathBuf>,
    /// Memory root holding MEMORY.md and memory/.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bring the index up to date with the memory files.
    Sync {
        /// Re-index every file, ignoring stored hashes.
        #[arg(long)]
        force: bool,
    },
    /// Hybrid keyword + vector search.
    Search {
        query: String,
        #[arg(long)]
        max_results: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print lines of a memory document.
    Read {
        /// Path relative to the memory root, e.g. memory/2026-01-01.md
        path: String,
        /// First line to print (1-indexed).
        #[arg(long)]
        from: Option<usize>,
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Show index statistics and the active embedding tier.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Keep the index fresh while memory files change.
    #[cfg(feature = "file-watcher")]
    Watch,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = mnemo_config::load(cli.config.as_deref())?;
    let manager = setup::build_manager(&config, cli.root.clone()).await?;

    match cli.command {
        Command::Sync { force } => commands::sync(&manager, force).await,
        Command::Search {
            query,
            max_results,
            min_score,
            json,
        } => commands::search(&manager, &query, max_results, min_score, json).await,
        Command::Read { path, from, lines } => commands::read(&manager, path, from, lines).await,
        Command::Status { json } => commands::status(&manager, json).await,
        #[cfg(feature = "file-watcher")]
        Command::Watch => {
            commands::watch(&manager, setup::poll_interval(&config.memory)).await
        },
    }
}
