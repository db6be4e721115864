//! Output formatters for analysis results.
//!
//! This module provides different output formats:
//! - Plain text summary for terminals ([`TextSummary`])
//! - JSON for automation and scripting ([`json`])
//! - CSV for spreadsheet import, one row per group member ([`csv`])
//!
//! [`save_reports`] writes all three into a results directory under
//! timestamped names (`duplicates_<stamp>.csv`, `duplicates_<stamp>.json`,
//! `summary_<stamp>.txt`).
//!
//! # Example
//!
//! ```no_run
//! use pixeldupe::duplicates::{AnalysisParams, AnalysisPipeline};
//! use pixeldupe::error::ExitCode;
//! use pixeldupe::output::json::JsonOutput;
//! use std::path::Path;
//!
//! let result = AnalysisPipeline::new(AnalysisParams::default())
//!     .analyze_directory(Path::new("."))
//!     .unwrap();
//!
//! let output = JsonOutput::new(&result, ExitCode::from_result(&result));
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod csv;
pub mod json;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;

use crate::duplicates::AnalysisResult;
use crate::error::ExitCode;

pub use csv::{CsvOutput, CsvOutputError, PURE_COLOR_REASON};
pub use json::{JsonOutput, JsonOutputError};

/// Timestamp format used in report file names.
const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Errors that can occur while saving report files.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A report file or the results directory could not be written.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Path being written
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// CSV rendering failed.
    #[error(transparent)]
    Csv(#[from] CsvOutputError),

    /// JSON rendering failed.
    #[error(transparent)]
    Json(#[from] JsonOutputError),
}

/// Paths of the files written by [`save_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    /// CSV report
    pub csv: PathBuf,
    /// JSON report
    pub json: PathBuf,
    /// Plain text summary
    pub summary: PathBuf,
}

/// Write CSV, JSON and text reports for `result` into `dir`.
///
/// The directory is created if needed. File names carry the local completion
/// time of the run.
///
/// # Errors
///
/// Returns `ReportError` if the directory or a file cannot be written.
pub fn save_reports(
    dir: &Path,
    result: &AnalysisResult,
    exit_code: ExitCode,
) -> Result<ReportFiles, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let completed = result.completed_at.with_timezone(&Local);
    let stamp = completed.format(FILE_STAMP_FORMAT).to_string();
    let files = ReportFiles {
        csv: dir.join(format!("duplicates_{}.csv", stamp)),
        json: dir.join(format!("duplicates_{}.json", stamp)),
        summary: dir.join(format!("summary_{}.txt", stamp)),
    };

    let csv = CsvOutput::new(&result.groups)
        .with_pure_color(&result.pure_color_paths)
        .to_string()?;
    let json = JsonOutput::new(result, exit_code)
        .to_json_pretty()
        .map_err(JsonOutputError::from)?;
    let summary = format!(
        "pixeldupe summary - {}\n\n{}\n",
        completed.format("%Y-%m-%d %H:%M:%S"),
        TextSummary::new(result)
    );

    for (path, contents) in [
        (&files.csv, csv),
        (&files.json, json),
        (&files.summary, summary),
    ] {
        fs::write(path, contents).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("Wrote {}", path.display());
    }
    Ok(files)
}

/// Human-readable report of an analysis run.
pub struct TextSummary<'a> {
    result: &'a AnalysisResult,
}

impl<'a> TextSummary<'a> {
    /// Create a text report for `result`.
    #[must_use]
    pub fn new(result: &'a AnalysisResult) -> Self {
        Self { result }
    }
}

impl fmt::Display for TextSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;

        for group in &result.groups {
            writeln!(
                f,
                "Group {} ({} images, {}):",
                group.id,
                group.len(),
                group.reason
            )?;
            for member in &group.members {
                if member.is_reference {
                    writeln!(f, "  * {}", member.path.display())?;
                    continue;
                }
                let distances: Vec<String> = member
                    .distances
                    .iter()
                    .map(|(kind, d)| format!("{}={}", kind, d))
                    .collect();
                if distances.is_empty() {
                    writeln!(f, "    {}", member.path.display())?;
                } else {
                    writeln!(
                        f,
                        "    {} ({})",
                        member.path.display(),
                        distances.join(", ")
                    )?;
                }
            }
            writeln!(f)?;
        }

        if !result.pure_color_paths.is_empty() {
            writeln!(f, "Pure-color images:")?;
            for path in &result.pure_color_paths {
                writeln!(f, "    {}", path.display())?;
            }
            writeln!(f)?;
        }

        if !result.failures.is_empty() {
            writeln!(f, "Failed images:")?;
            for failure in &result.failures {
                writeln!(f, "    {}: {}", failure.path.display(), failure.message)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Analyzed images:  {}", result.total_images)?;
        writeln!(f, "Duplicate groups: {}", result.groups.len())?;
        writeln!(f, "Duplicate images: {}", result.duplicate_images)?;
        for (reason, count) in result.reason_counts() {
            writeln!(f, "  {:<24} {}", reason, count)?;
        }
        writeln!(f, "Pure-color:       {}", result.pure_color_images)?;
        writeln!(f, "Failed:           {}", result.failures.len())?;
        write!(f, "Duration:         {:.2?}", result.duration)?;

        if let Some(error) = &result.error {
            write!(f, "\nError: {}", error)?;
        }
        Ok(())
    }
}
