//! Runbox CLI application
//!
//! Runs untrusted Python snippets through the runbox sandbox backends.
//!
//! # Commands
//!
//! - `runbox run` executes a file or inline code and prints the result as
//!   text, markdown, JSON or an LLM-oriented summary.
//! - `runbox check` runs only the static security check.
//! - `runbox health` probes a backend once.
//! - `runbox sweep` removes stale workspaces and orphaned containers.
//!
//! Set `RUST_LOG` or pass `--verbose` for more logging.

mod args;
mod commands;
mod router;

use args::Cli;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);
    router::route(cli).await
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "runbox=debug,runbox_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
