// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procflow",
    version,
    about = "Run a pool or pipeline of processes described in a TOML file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Procflow.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config and print the execution order without running
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print results as JSON instead of one summary line per command.
    #[arg(long)]
    pub json: bool,

    /// Grace period for Ctrl-C before running commands are force-killed.
    #[arg(long, value_name = "DURATION", default_value = "5s", value_parser = crate::config::parse_duration)]
    pub stop_timeout: std::time::Duration,
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
