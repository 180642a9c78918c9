//! Coalesce
//!
//! Model-driven code generation for C# APIs and TypeScript clients.
//!
//! This is the entry point of the `coalesce` command-line tool.

use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coalesce_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    coalesce_cli::run(cli).await
}
