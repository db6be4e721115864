//! Command-line interface definitions for pixeldupe.
//!
//! Every analysis flag is optional so that, when absent, the value from the
//! config file or environment is kept (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Find near-duplicates below a directory
//! pixeldupe analyze ~/Pictures
//!
//! # Only dHash and pHash, both must agree, rotations included
//! pixeldupe analyze ~/Pictures --kinds dhash,phash --min-agreement 2 --rotation
//!
//! # JSON report for scripting
//! pixeldupe analyze ~/Pictures --output json > report.json
//!
//! # Catch copies saved at other resolutions, keep timestamped reports
//! pixeldupe analyze ~/Pictures --multi-scale --output-dir results
//!
//! # Print the effective configuration
//! pixeldupe config
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::hashing::HashKind;

/// Near-duplicate image finder using perceptual hashing.
///
/// pixeldupe fingerprints images with dHash, pHash and aHash, clusters images
/// whose hashes fall within per-algorithm thresholds, and reports each group
/// with the reason it was formed.
#[derive(Debug, Parser)]
#[command(name = "pixeldupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print fatal errors as a JSON object on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find near-duplicate images in directories or files
    Analyze(AnalyzeArgs),
    /// Show or write the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the analyze subcommand.
#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Directories to scan or image files to compare
    #[arg(value_name = "PATH", required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Also save CSV, JSON and summary reports with timestamped names here
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(long, overrides_with = "no_recursive")]
    pub recursive: bool,

    /// Only scan the top level of each directory
    #[arg(long, overrides_with = "recursive")]
    pub no_recursive: bool,

    /// Maximum dHash distance for a match
    #[arg(long, value_name = "N")]
    pub dhash_threshold: Option<u32>,

    /// Maximum pHash distance for a match
    #[arg(long, value_name = "N")]
    pub phash_threshold: Option<u32>,

    /// Maximum aHash distance for a match
    #[arg(long, value_name = "N")]
    pub ahash_threshold: Option<u32>,

    /// Hash size N (dHash/aHash produce N² bits, pHash N²-1)
    #[arg(long, value_name = "N")]
    pub hash_size: Option<u32>,

    /// Hash kinds to compute, comma separated (dhash, phash, ahash)
    #[arg(long, value_name = "KINDS", value_delimiter = ',')]
    pub kinds: Option<Vec<HashKind>>,

    /// Do not detect and exclude pure-color images
    #[arg(long)]
    pub no_pure_color: bool,

    /// Channel standard deviation below which an image is pure color
    #[arg(long, value_name = "STD")]
    pub pure_color_threshold: Option<f64>,

    /// Also compare images rotated by 90, 180 and 270 degrees
    #[arg(long)]
    pub rotation: bool,

    /// Also compare 75% and 125% rescaled copies under widened thresholds
    #[arg(long)]
    pub multi_scale: bool,

    /// Do not match byte-identical files by fingerprint
    #[arg(long)]
    pub no_exact: bool,

    /// Number of hash kinds that must agree for a pair to match
    #[arg(long, value_name = "N")]
    pub min_agreement: Option<usize>,

    /// Worker threads for hashing (0 = all cores)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Follow symbolic links while scanning
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Include hidden files and directories
    #[arg(long)]
    pub include_hidden: bool,
}

impl AnalyzeArgs {
    /// Apply the flags given on the command line on top of `config`.
    #[must_use]
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if self.recursive {
            config.recursive = true;
        }
        if self.no_recursive {
            config.recursive = false;
        }
        if let Some(t) = self.dhash_threshold {
            config.dhash_threshold = t;
        }
        if let Some(t) = self.phash_threshold {
            config.phash_threshold = t;
        }
        if let Some(t) = self.ahash_threshold {
            config.ahash_threshold = t;
        }
        if let Some(size) = self.hash_size {
            config.hash_size = size;
        }
        if let Some(kinds) = &self.kinds {
            config.kinds = kinds.clone();
        }
        if self.no_pure_color {
            config.detect_pure_color = false;
        }
        if let Some(threshold) = self.pure_color_threshold {
            config.pure_color_threshold = threshold;
        }
        if self.rotation {
            config.detect_rotation = true;
        }
        if self.multi_scale {
            config.multi_scale = true;
        }
        if self.no_exact {
            config.detect_exact = false;
        }
        if let Some(n) = self.min_agreement {
            config.min_matching_kinds = n;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.follow_symlinks {
            config.follow_symlinks = true;
        }
        if self.include_hidden {
            config.skip_hidden = false;
        }
        config
    }
}

/// Arguments for the config subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Only print the default config file path
    #[arg(long, conflicts_with = "save")]
    pub path: bool,

    /// Write the effective configuration to the config file
    #[arg(long)]
    pub save: bool,
}

/// Output format for analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// JSON output for scripting
    Json,
    /// CSV output for spreadsheets
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
