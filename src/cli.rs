// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `stackrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stackrun",
    version,
    about = "Run a command in every stack and track each stack's lifecycle.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the stack manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "Stackrun.toml")]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STACKRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run a command in every stack, one stack at a time.
    Run(RunArgs),
    /// Print the lifecycle events recorded remotely for a run.
    Events(EventsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Mirror every stack's lifecycle to the deployment-tracking service.
    #[arg(long)]
    pub cloud_sync_deployment: bool,

    /// Keep running the remaining stacks after one fails.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Print the stacks and command, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command and arguments to run in each stack.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "CMD"
    )]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct EventsArgs {
    /// Run identifier to query.
    #[arg(long, value_name = "ID")]
    pub run_id: String,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
