//! CLI argument definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "runbox")]
#[command(about = "Runbox - bounded execution of untrusted Python snippets")]
#[command(
    long_about = r#"Runbox - bounded execution of untrusted Python snippets

USAGE:
  runbox run script.py                 # Run a file on the default backend
  runbox run -c "print(1 + 1)"         # Run inline code
  runbox run -b container script.py    # Run inside a Docker container
  runbox check script.py               # Static security check only
  runbox health -b local               # Probe a backend once
  runbox sweep                         # Remove stale workspaces

For detailed help: runbox <command> --help"#
)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "RUNBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute code in a sandbox
    Run(RunArgs),

    /// Run the static security check without executing anything
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one health probe against a backend
    Health {
        /// Backend to probe (defaults to the configured backend)
        #[arg(long, short)]
        backend: Option<String>,
    },

    /// Remove stale workspaces and orphaned containers
    Sweep {
        /// Age in seconds after which a resource counts as stale
        #[arg(long)]
        max_age: Option<u64>,

        /// Also sweep containers through the Docker daemon
        #[arg(long)]
        containers: bool,

        /// Keep sweeping on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },
}

/// Where the guest code comes from
#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Script file; `-` reads standard input
    #[arg(conflicts_with = "code")]
    pub file: Option<PathBuf>,

    /// Inline code
    #[arg(long, short = 'c')]
    pub code: Option<String>,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Backend name (local, container, docker)
    #[arg(long, short)]
    pub backend: Option<String>,

    /// Wall-clock timeout in seconds
    #[arg(long, short)]
    pub timeout: Option<u64>,

    /// Memory limit in MiB
    #[arg(long, short)]
    pub memory: Option<u64>,

    /// Allow network access (container backend only)
    #[arg(long)]
    pub network: bool,

    /// Text fed to the guest's standard input
    #[arg(long)]
    pub input: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Include execution metrics in text output
    #[arg(long)]
    pub metrics: bool,

    /// Color the status line of text output
    #[arg(long)]
    pub color: bool,

    /// Append an audit record to this file
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// Caller identity recorded in the audit log
    #[arg(long)]
    pub actor: Option<String>,

    /// Session identity recorded in the audit log
    #[arg(long)]
    pub session: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Markdown,
    Json,
    Llm,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "runbox", "run", "-c", "print(1)", "-b", "container", "-t", "5", "-f", "json",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source.code.as_deref(), Some("print(1)"));
        assert_eq!(args.backend.as_deref(), Some("container"));
        assert_eq!(args.timeout, Some(5));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(!args.color);
    }

    #[test]
    fn test_file_and_code_conflict() {
        assert!(Cli::try_parse_from(["runbox", "check", "a.py", "-c", "x = 1"]).is_err());
    }
}
