//! Process exit codes and structured error reporting.

use serde::Serialize;

use crate::duplicates::{AnalysisResult, PipelineError};

/// Exit codes for the pixeldupe binary.
///
/// - 0: Success (analysis completed, duplicates found)
/// - 1: General error (configuration, scan or unexpected failure)
/// - 2: No duplicates found
/// - 3: Partial success (some images could not be decoded)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Analysis completed and duplicates were found.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Analysis completed but no duplicates were found.
    NoDuplicates = 2,
    /// Analysis completed but some images failed.
    PartialSuccess = 3,
    /// Interrupted by Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PD000",
            Self::GeneralError => "PD001",
            Self::NoDuplicates => "PD002",
            Self::PartialSuccess => "PD003",
            Self::Interrupted => "PD130",
        }
    }

    /// Exit code for a completed analysis.
    ///
    /// A run with no decodable image at all is a general error. Failures on
    /// some images downgrade the outcome to partial success.
    #[must_use]
    pub fn from_result(result: &AnalysisResult) -> Self {
        if result.error.is_some() {
            Self::GeneralError
        } else if !result.failures.is_empty() {
            Self::PartialSuccess
        } else if result.has_duplicates() {
            Self::Success
        } else {
            Self::NoDuplicates
        }
    }

    /// Exit code for an error that escaped `run_app`.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Interrupted) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
