//! Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;

/// Strip near-white backgrounds from images
#[derive(Debug, Parser)]
#[command(name = "logo-matte", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Make near-white pixels transparent and write PNGs or data URIs
    Strip(StripArgs),
    /// Report how many pixels would be stripped, without writing anything
    Check(CheckArgs),
    /// Show version and config file locations
    Info,
}

/// Arguments for the `strip` subcommand
#[derive(Debug, Args)]
pub struct StripArgs {
    /// Image files, directories, URLs or data URIs
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output directory for processed PNGs
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Channel value R, G and B must all exceed (0-255)
    #[arg(short, long)]
    pub threshold: Option<u8>,

    /// Load timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print a data URI per input instead of writing files
    #[arg(long)]
    pub data_uri: bool,

    /// Images processed concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Count failures as errors instead of falling back to the original
    #[arg(long)]
    pub no_fallback: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl StripArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            threshold: self.threshold,
            timeout_secs: self.timeout,
            jobs: self.jobs,
            fallback: self.no_fallback.then_some(false),
            output_dir: self.output.clone(),
        }
    }
}

/// Arguments for the `check` subcommand
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Image file, URL or data URI
    pub input: String,

    /// Channel value R, G and B must all exceed (0-255)
    #[arg(short, long)]
    pub threshold: Option<u8>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl CheckArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            threshold: self.threshold,
            ..CliOverrides::new()
        }
    }
}

/// Flags shared by processing subcommands
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Config file (default: ./logo-matte.toml, then user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
