//! # sitelog CLI entry point
//!
//! Wires the capture and list-sync cores to a real backend over HTTP.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod checkin;
mod list;

/// Site attendance capture and list sync against the construction backend.
#[derive(Parser, Debug)]
#[command(name = "sitelog", version, about)]
struct Cli {
    #[command(flatten)]
    backend: backend::BackendArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Page through a list endpoint, printing one JSON row per line.
    List(list::ListArgs),
    /// Run check-in capture, reading one scanned badge payload per stdin line.
    ///
    /// Lines arriving while a check-in is submitting or its feedback is still
    /// showing (see --re-arm-ms) are ignored, not queued.
    Checkin(checkin::CheckinArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("sitelog v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Commands::List(args) => list::run(&cli.backend, args).await,
        Commands::Checkin(args) => checkin::run(&cli.backend, args).await,
    }
}
