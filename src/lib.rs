//! pixeldupe - Near-duplicate image finder
//!
//! A Rust library and CLI that fingerprints images with perceptual hashes
//! (dHash, pHash, aHash), measures Hamming distances between them and
//! clusters near-duplicates with union-find, reporting why each group formed.
//!
//! # Library usage
//!
//! ```no_run
//! use pixeldupe::duplicates::{AnalysisParams, AnalysisPipeline};
//! use pixeldupe::hashing::HashKind;
//! use std::path::Path;
//!
//! let params = AnalysisParams::default()
//!     .with_kinds(vec![HashKind::Dhash, HashKind::Phash])
//!     .with_rotation(true);
//! let result = AnalysisPipeline::new(params)
//!     .analyze_directory(Path::new("photos"))
//!     .unwrap();
//!
//! for group in &result.groups {
//!     println!("{}: {} images", group.reason, group.len());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{AnalyzeArgs, Cli, Commands, ConfigArgs, OutputFormat};
use crate::config::Config;
use crate::duplicates::{AnalysisPipeline, AnalysisResult};
use crate::error::ExitCode;
use crate::output::{CsvOutput, JsonOutput, TextSummary};
use crate::progress::Progress;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration, unreadable inputs, output
/// failures, or an interrupted run (`PipelineError::Interrupted`).
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Commands::Analyze(args) => run_analyze(&cli, args, config),
        Commands::Config(args) => run_config(&cli, args, config),
    }
}

fn run_analyze(cli: &Cli, args: &AnalyzeArgs, config: Config) -> anyhow::Result<ExitCode> {
    let config = args.apply_overrides(config);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let handler = signal::install_handler().context("Failed to set up Ctrl+C handling")?;
    let pipeline = AnalysisPipeline::new(config.to_params())
        .with_threads(config.threads)
        .with_scan_config(config.scan_config())
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(Progress::new(cli.quiet)));

    let mut inputs = Vec::new();
    let mut seen = HashSet::new();
    for path in &args.paths {
        let found = if path.is_dir() {
            pipeline.collect_images(path)?
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            anyhow::bail!("Path not found: {}", path.display());
        };
        inputs.extend(found.into_iter().filter(|p: &PathBuf| seen.insert(p.clone())));
    }

    let result = pipeline.analyze_files(inputs)?;
    let exit_code = ExitCode::from_result(&result);
    write_report(&result, args.output, exit_code)?;
    if let Some(dir) = &args.output_dir {
        let files = output::save_reports(dir, &result, exit_code)
            .with_context(|| format!("Failed to save reports to {}", dir.display()))?;
        log::info!(
            "Reports saved: {}, {}, {}",
            files.csv.display(),
            files.json.display(),
            files.summary.display()
        );
    }
    Ok(exit_code)
}

fn write_report(
    result: &AnalysisResult,
    format: OutputFormat,
    exit_code: ExitCode,
) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Text => writeln!(out, "{}", TextSummary::new(result))?,
        OutputFormat::Json => JsonOutput::new(result, exit_code).write_to(&mut out, true)?,
        OutputFormat::Csv => CsvOutput::new(&result.groups)
            .with_pure_color(&result.pure_color_paths)
            .write_to(&mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs, config: Config) -> anyhow::Result<ExitCode> {
    let target = cli.config.clone().or_else(Config::default_path);

    if args.path {
        match target {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("Could not determine a config directory"),
        }
        return Ok(ExitCode::Success);
    }

    if args.save {
        let path = target.context("Could not determine a config directory")?;
        config.save(&path)?;
        return Ok(ExitCode::Success);
    }

    print!("{}", config.to_toml()?);
    Ok(ExitCode::Success)
}
