//! CSV output formatter for analysis results.
//!
//! One row is generated for each member of each duplicate group. Pure-color
//! images, when supplied, follow as one extra group with the reason
//! `pure color` and no distances.
//!
//! # Columns
//!
//! - `group_id`: 1-based group number
//! - `reason`: Criteria that merged the group (e.g. `dHash+pHash`)
//! - `path`: Path to the image
//! - `is_reference`: Whether the row is the group's reference image
//! - `dhash_distance`, `phash_distance`, `ahash_distance`: Distance to the
//!   reference (empty for the reference itself or a disabled kind)

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::duplicates::DuplicateGroup;
use crate::hashing::HashKind;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A single row in the CSV output.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group_id: usize,
    reason: &'a str,
    path: String,
    is_reference: bool,
    dhash_distance: Option<u32>,
    phash_distance: Option<u32>,
    ahash_distance: Option<u32>,
}

/// Reason written for pure-color rows.
pub const PURE_COLOR_REASON: &str = "pure color";

/// CSV output formatter.
pub struct CsvOutput<'a> {
    groups: &'a [DuplicateGroup],
    pure_color: &'a [PathBuf],
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self {
            groups,
            pure_color: &[],
        }
    }

    /// Append the pure-color images as their own group.
    #[must_use]
    pub fn with_pure_color(mut self, paths: &'a [PathBuf]) -> Self {
        self.pure_color = paths;
        self
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for group in self.groups {
            for member in &group.members {
                let distance = |kind: HashKind| member.distances.get(&kind).copied();
                csv_writer.serialize(CsvRow {
                    group_id: group.id,
                    reason: &group.reason,
                    path: member.path.to_string_lossy().into_owned(),
                    is_reference: member.is_reference,
                    dhash_distance: distance(HashKind::Dhash),
                    phash_distance: distance(HashKind::Phash),
                    ahash_distance: distance(HashKind::Ahash),
                })?;
            }
        }

        if !self.pure_color.is_empty() {
            let group_id = self.groups.iter().map(|g| g.id).max().unwrap_or(0) + 1;
            for path in self.pure_color {
                csv_writer.serialize(CsvRow {
                    group_id,
                    reason: PURE_COLOR_REASON,
                    path: path.to_string_lossy().into_owned(),
                    is_reference: false,
                    dhash_distance: None,
                    phash_distance: None,
                    ahash_distance: None,
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::{GroupMember, MatchCriterion};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn group(paths: &[&str]) -> DuplicateGroup {
        DuplicateGroup {
            id: 1,
            reason: "dHash+pHash".to_string(),
            criteria: vec![MatchCriterion::Exact],
            members: paths
                .iter()
                .enumerate()
                .map(|(i, p)| GroupMember {
                    id: i,
                    path: PathBuf::from(p),
                    is_reference: i == 0,
                    distances: if i == 0 {
                        BTreeMap::new()
                    } else {
                        BTreeMap::from([(HashKind::Dhash, 3), (HashKind::Phash, 7)])
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn test_csv_output_basic() {
        let groups = vec![group(&["/img/a.png", "/img/b.png"])];
        let csv_str = CsvOutput::new(&groups).to_string().unwrap();
        let lines: Vec<&str> = csv_str.lines().collect();

        assert_eq!(
            lines[0],
            "group_id,reason,path,is_reference,dhash_distance,phash_distance,ahash_distance"
        );
        assert_eq!(lines[1], "1,dHash+pHash,/img/a.png,true,,,");
        assert_eq!(lines[2], "1,dHash+pHash,/img/b.png,false,3,7,");
    }

    #[test]
    fn test_csv_output_quoting() {
        let groups = vec![group(&["/img/file,with,comma.png", "/img/b.png"])];
        let csv_str = CsvOutput::new(&groups).to_string().unwrap();
        assert!(csv_str.contains("\"/img/file,with,comma.png\""));
    }

    #[test]
    fn test_csv_output_pure_color_group() {
        let groups = vec![group(&["/img/a.png", "/img/b.png"])];
        let blanks = vec![PathBuf::from("/img/white.png"), PathBuf::from("/img/black.png")];
        let csv_str = CsvOutput::new(&groups)
            .with_pure_color(&blanks)
            .to_string()
            .unwrap();
        let lines: Vec<&str> = csv_str.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "2,pure color,/img/white.png,false,,,");
        assert_eq!(lines[4], "2,pure color,/img/black.png,false,,,");
    }

    #[test]
    fn test_csv_output_only_pure_color() {
        let blanks = vec![PathBuf::from("/img/white.png")];
        let csv_str = CsvOutput::new(&[]).with_pure_color(&blanks).to_string().unwrap();
        assert!(csv_str.ends_with("1,pure color,/img/white.png,false,,,\n"));
    }

    #[test]
    fn test_csv_output_empty() {
        let csv_str = CsvOutput::new(&[]).to_string().unwrap();
        assert!(csv_str.is_empty());
    }
}
