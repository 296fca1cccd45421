//! CLI argument parsing for schedrecon

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the reconstructed model
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Canonical JSON (default)
    Json,
    /// MessagePack with named fields
    Msgpack,
    /// Flattened CSV for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "schedrecon")]
#[command(version)]
#[command(
    about = "Reconstruct per-CPU and per-task scheduling timelines from per-processor trace records",
    long_about = None
)]
pub struct Cli {
    /// Run descriptor (JSON or .toml) listing CPU record files, pc_map and task_map
    #[arg(value_name = "DESCRIPTOR")]
    pub descriptor: PathBuf,

    /// Write the model to FILE instead of stdout
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// CSV only: omit per-task rows
    #[arg(long = "cpu-only")]
    pub cpu_only: bool,

    /// Print a reconstruction summary (busy time, on-CPU time, counters) to stderr
    #[arg(short = 'c', long = "summary")]
    pub summary: bool,

    /// Write derived occupancy and queue-phase intervals to FILE (JSON)
    #[arg(long = "intervals", value_name = "FILE")]
    pub intervals: Option<PathBuf>,

    /// Beginning of the region of interest for interval derivation
    #[arg(short = 'b', long = "begin", value_name = "TIME", default_value = "0")]
    pub begin: u64,

    /// End of the region of interest (ignored unless greater than --begin)
    #[arg(short = 'e', long = "end", value_name = "TIME", default_value = "0")]
    pub end: u64,

    /// CPUs of the region of interest (default: all)
    #[arg(long = "cpus", value_name = "CPU", value_delimiter = ',')]
    pub cpus: Vec<u32>,

    /// Print the SHA-256 digest of the canonical JSON to stderr
    #[arg(long = "digest")]
    pub digest: bool,

    /// Exit with an error if any consistency warning was raised
    #[arg(long = "strict")]
    pub strict: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
