// src/cli.rs

//! Command-line interface definitions.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Parser)]
#[command(
    name = "rundag",
    about = "Run a DAG of shell tasks with retries on a schedule"
)]
pub struct CliArgs {
    /// Path to the TOML task definition file.
    #[arg(default_value = "Rundag.toml")]
    pub config: String,

    /// Submit a single run immediately and exit when it finishes.
    #[arg(long)]
    pub once: bool,

    /// Maximum number of concurrently running tasks
    /// (overrides [config].concurrency).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the parsed graph and exit without executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (overrides the RUNDAG_LOG environment variable).
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}
