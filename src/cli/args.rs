//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Track and resume batch photo classification across datasets
#[derive(Parser, Debug)]
#[command(name = "photo-batch")]
#[command(version)]
#[command(about = "Classify photo datasets in resumable batches, one registry entry per photo", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory containing one subdirectory per dataset (overrides config)
    #[arg(short, long, global = true)]
    pub datasets_dir: Option<PathBuf>,

    /// Registry file holding processing progress (overrides config)
    #[arg(short, long, global = true)]
    pub registry_file: Option<PathBuf>,

    /// Directory for results_<dataset>.json files (overrides config)
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// Classifier program run once per photo (overrides config)
    #[arg(long, global = true)]
    pub classifier: Option<String>,

    /// Photos classified concurrently within a dataset (overrides config)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Per-photo classifier timeout in seconds, 0 to disable (overrides config)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Discover datasets and classify every pending photo (default)
    Run,

    /// Show per-dataset progress from the registry
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the photos of a dataset that are still pending
    Pending {
        /// Dataset identifier
        dataset: String,
    },

    /// List the datasets and photos found in the datasets directory
    Discover,

    /// Show current configuration
    ShowConfig,

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
