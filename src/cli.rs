// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `delegate-stage`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "delegate-stage",
    version,
    about = "Run one pipeline stage backed by an external program over stdin/stdout.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the stage config file (TOML).
    ///
    /// Default: `delegate-stage.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "delegate-stage.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DELEGATE_STAGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Capacity of the channel carrying packets emitted by the stage.
    #[arg(long, value_name = "N", default_value_t = 64)]
    pub buffer: usize,

    /// Parse + validate, print the delegate command line, but don't spawn it.
    #[arg(long)]
    pub dry_run: bool,
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
