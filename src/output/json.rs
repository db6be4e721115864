//! JSON output formatter for analysis results.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "group_id": 1,
//!       "reason": "dHash+pHash",
//!       "reference": "/photos/a.jpg",
//!       "members": [
//!         { "path": "/photos/a.jpg", "is_reference": true, "distances": {} },
//!         { "path": "/photos/b.jpg", "is_reference": false, "distances": { "dhash": 2, "phash": 4 } }
//!       ]
//!     }
//!   ],
//!   "pure_color_images": ["/photos/blank.png"],
//!   "failures": [{ "path": "/photos/broken.png", "message": "..." }],
//!   "summary": {
//!     "total_images": 100,
//!     "duplicate_images": 1,
//!     "duplicate_groups": 1,
//!     "pure_color_images": 1,
//!     "failed_images": 1,
//!     "duration_ms": 1234,
//!     "completed_at": "2024-01-01T00:00:00Z",
//!     "exit_code": 0,
//!     "exit_code_name": "PD000",
//!     "error": null
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::duplicates::{AnalysisResult, DuplicateGroup, MatchCriterion};
use crate::error::ExitCode;
use crate::hashing::HashKind;

/// A group member in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonMember {
    /// Path to the image
    pub path: String,
    /// Whether this member is the group reference
    pub is_reference: bool,
    /// Distance to the reference per hash kind
    pub distances: BTreeMap<HashKind, u32>,
}

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// 1-based group number
    pub group_id: usize,
    /// Human-readable reason
    pub reason: String,
    /// Structured criteria behind the reason
    pub criteria: Vec<MatchCriterion>,
    /// Path of the reference image
    pub reference: String,
    /// All members, reference first
    pub members: Vec<JsonMember>,
}

impl JsonDuplicateGroup {
    /// Create a JSON group from a [`DuplicateGroup`].
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            group_id: group.id,
            reason: group.reason.clone(),
            criteria: group.criteria.clone(),
            reference: group
                .reference()
                .map(|m| display_path(&m.path))
                .unwrap_or_default(),
            members: group
                .members
                .iter()
                .map(|m| JsonMember {
                    path: display_path(&m.path),
                    is_reference: m.is_reference,
                    distances: m.distances.clone(),
                })
                .collect(),
        }
    }
}

/// A failed image in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFailure {
    /// Path to the image
    pub path: String,
    /// Failure description
    pub message: String,
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Number of images decoded successfully
    pub total_images: usize,
    /// Number of duplicates (group members other than the reference)
    pub duplicate_images: usize,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Number of pure-color images
    pub pure_color_images: usize,
    /// Number of images that failed to decode
    pub failed_images: usize,
    /// Duration of the run in milliseconds
    pub duration_ms: u64,
    /// Completion timestamp (RFC 3339)
    pub completed_at: String,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "PD000")
    pub exit_code_name: String,
    /// Top-level error, if the run produced no usable results
    pub error: Option<String>,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Duplicate groups
    pub groups: Vec<JsonDuplicateGroup>,
    /// Pure-color image paths
    pub pure_color_images: Vec<String>,
    /// Images that could not be analyzed
    pub failures: Vec<JsonFailure>,
    /// Summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output from an analysis result and exit code.
    #[must_use]
    pub fn new(result: &AnalysisResult, exit_code: ExitCode) -> Self {
        Self {
            groups: result
                .groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            pure_color_images: result
                .pure_color_paths
                .iter()
                .map(|p| display_path(p))
                .collect(),
            failures: result
                .failures
                .iter()
                .map(|f| JsonFailure {
                    path: display_path(&f.path),
                    message: f.message.clone(),
                })
                .collect(),
            summary: JsonSummary {
                total_images: result.total_images,
                duplicate_images: result.duplicate_images,
                duplicate_groups: result.groups.len(),
                pure_color_images: result.pure_color_images,
                failed_images: result.failures.len(),
                duration_ms: result.duration.as_millis() as u64,
                completed_at: result.completed_at.to_rfc3339(),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
                error: result.error.clone(),
            },
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::{AnalysisParams, GroupingEngine, ImageRecord};
    use crate::hashing::{HashCode, HashValue, ImageCodes, Rotation};

    fn sample_result() -> AnalysisResult {
        let mut codes = ImageCodes::new();
        codes.insert(
            HashKind::Dhash,
            Rotation::Deg0,
            HashValue::Valid(HashCode::from_hex("00000000000000ff", 64).unwrap()),
        );
        let mut near = ImageCodes::new();
        near.insert(
            HashKind::Dhash,
            Rotation::Deg0,
            HashValue::Valid(HashCode::from_hex("00000000000000fe", 64).unwrap()),
        );
        let records = vec![
            ImageRecord::new(0, "/img/a.png".into(), codes),
            ImageRecord::new(1, "/img/b.png".into(), near),
        ];
        let params = AnalysisParams::default().with_kinds(vec![HashKind::Dhash]);
        let groups = GroupingEngine::new(params).group(&records);

        AnalysisResult {
            total_images: 2,
            duplicate_images: 1,
            groups,
            ..Default::default()
        }
    }

    #[test]
    fn test_json_structure() {
        let result = sample_result();
        let output = JsonOutput::new(&result, ExitCode::Success);
        let value: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();

        assert_eq!(value["groups"][0]["group_id"], 1);
        assert_eq!(value["groups"][0]["reason"], "dHash");
        assert_eq!(value["groups"][0]["reference"], "/img/a.png");
        assert_eq!(value["groups"][0]["members"][1]["distances"]["dhash"], 1);
        assert_eq!(value["summary"]["exit_code_name"], "PD000");
    }

    #[test]
    fn test_pretty_output_has_newlines() {
        let output = JsonOutput::new(&sample_result(), ExitCode::Success);
        assert!(output.to_json_pretty().unwrap().contains('\n'));
    }

    #[test]
    fn test_write_to_appends_newline() {
        let output = JsonOutput::new(&sample_result(), ExitCode::Success);
        let mut buffer = Vec::new();
        output.write_to(&mut buffer, false).unwrap();
        assert_eq!(buffer.last(), Some(&b'\n'));
    }
}
