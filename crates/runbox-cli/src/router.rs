//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::commands;
use anyhow::Context;
use runbox_core::config::{ConfigLoader, SandboxConfig};
use std::path::Path;
use std::process::ExitCode;

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(config, args).await,
        Commands::Check { source, json } => commands::check::execute(&config, &source, json),
        Commands::Health { backend } => commands::health::execute(config, backend).await,
        Commands::Sweep {
            max_age,
            containers,
            watch,
        } => commands::sweep::execute(&config, max_age, containers, watch).await,
    }
}

/// Defaults, then the optional file, then `RUNBOX_*` overrides
fn load_config(path: Option<&Path>) -> anyhow::Result<SandboxConfig> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader
        .with_env()
        .load()
        .context("failed to load runbox configuration")
}
