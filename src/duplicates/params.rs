//! Immutable analysis parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hashing::perceptual::DEFAULT_HASH_SIZE;
use crate::hashing::pure_color::DEFAULT_PURE_COLOR_THRESHOLD;
use crate::hashing::{HashKind, Rotation, MULTI_SCALE_PERCENTS};

/// Errors produced while validating parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    /// The parameters cannot be used for an analysis run.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Configuration of one analysis run.
///
/// Built once and passed by value or reference into every stage; never mutated
/// during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Maximum dHash distance for a match
    pub dhash_threshold: u32,
    /// Maximum pHash distance for a match
    pub phash_threshold: u32,
    /// Maximum aHash distance for a match
    pub ahash_threshold: u32,
    /// Hash size (N) shared by all kinds
    pub hash_size: u32,
    /// Enabled hash kinds
    pub kinds: Vec<HashKind>,
    /// Detect and exclude pure-color images
    pub detect_pure_color: bool,
    /// Per-channel standard deviation threshold for pure-color detection
    pub pure_color_threshold: f64,
    /// Compare rotated variants (90/180/270)
    pub detect_rotation: bool,
    /// Also compare rescaled copies under widened thresholds
    #[serde(default)]
    pub multi_scale: bool,
    /// Match byte-identical files through their fingerprints
    pub detect_exact: bool,
    /// Number of hash kinds that must agree for a pair to match
    pub min_matching_kinds: usize,
    /// Walk directories recursively
    pub recursive_scan: bool,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            dhash_threshold: HashKind::Dhash.default_threshold(),
            phash_threshold: HashKind::Phash.default_threshold(),
            ahash_threshold: HashKind::Ahash.default_threshold(),
            hash_size: DEFAULT_HASH_SIZE,
            kinds: HashKind::ALL.to_vec(),
            detect_pure_color: true,
            pure_color_threshold: DEFAULT_PURE_COLOR_THRESHOLD,
            detect_rotation: false,
            multi_scale: false,
            detect_exact: true,
            min_matching_kinds: 1,
            recursive_scan: true,
        }
    }
}

impl AnalysisParams {
    /// Set the threshold for one hash kind.
    #[must_use]
    pub fn with_threshold(mut self, kind: HashKind, threshold: u32) -> Self {
        match kind {
            HashKind::Dhash => self.dhash_threshold = threshold,
            HashKind::Phash => self.phash_threshold = threshold,
            HashKind::Ahash => self.ahash_threshold = threshold,
        }
        self
    }

    /// Set the hash size.
    #[must_use]
    pub fn with_hash_size(mut self, size: u32) -> Self {
        self.hash_size = size;
        self
    }

    /// Restrict the enabled hash kinds.
    #[must_use]
    pub fn with_kinds(mut self, kinds: Vec<HashKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Enable or disable pure-color detection.
    #[must_use]
    pub fn with_pure_color(mut self, enabled: bool) -> Self {
        self.detect_pure_color = enabled;
        self
    }

    /// Set the pure-color threshold.
    #[must_use]
    pub fn with_pure_color_threshold(mut self, threshold: f64) -> Self {
        self.pure_color_threshold = threshold;
        self
    }

    /// Enable or disable rotation-aware comparison.
    #[must_use]
    pub fn with_rotation(mut self, enabled: bool) -> Self {
        self.detect_rotation = enabled;
        self
    }

    /// Enable or disable multi-scale comparison.
    #[must_use]
    pub fn with_multi_scale(mut self, enabled: bool) -> Self {
        self.multi_scale = enabled;
        self
    }

    /// Enable or disable exact (fingerprint) matching.
    #[must_use]
    pub fn with_exact(mut self, enabled: bool) -> Self {
        self.detect_exact = enabled;
        self
    }

    /// Set the number of hash kinds that must agree.
    #[must_use]
    pub fn with_min_matching_kinds(mut self, count: usize) -> Self {
        self.min_matching_kinds = count;
        self
    }

    /// Enable or disable recursive directory scanning.
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive_scan = recursive;
        self
    }

    /// Threshold configured for `kind`.
    #[must_use]
    pub fn threshold(&self, kind: HashKind) -> u32 {
        match kind {
            HashKind::Dhash => self.dhash_threshold,
            HashKind::Phash => self.phash_threshold,
            HashKind::Ahash => self.ahash_threshold,
        }
    }

    /// Threshold for `kind` when comparing across scales.
    #[must_use]
    pub fn scaled_threshold(&self, kind: HashKind) -> u32 {
        self.threshold(kind).saturating_add(kind.scale_slack())
    }

    /// Rescaled copies to hash besides the original size.
    #[must_use]
    pub fn scale_percents(&self) -> Vec<u32> {
        if self.multi_scale {
            MULTI_SCALE_PERCENTS.to_vec()
        } else {
            Vec::new()
        }
    }

    /// Rotations to hash: all four when rotation detection is on, else 0° only.
    #[must_use]
    pub fn rotations(&self) -> Vec<Rotation> {
        if self.detect_rotation {
            Rotation::ALL.to_vec()
        } else {
            vec![Rotation::Deg0]
        }
    }

    /// Enabled kinds, deduplicated, in reporting order.
    #[must_use]
    pub fn enabled_kinds(&self) -> Vec<HashKind> {
        HashKind::ALL
            .into_iter()
            .filter(|k| self.kinds.contains(k))
            .collect()
    }

    /// Check that the parameters describe a runnable analysis.
    ///
    /// # Errors
    ///
    /// Returns `ParamsError::InvalidConfiguration` when:
    /// - no hash kind is enabled and exact matching is off
    /// - the hash size is outside the range supported by an enabled kind
    /// - `min_matching_kinds` is zero or exceeds the number of enabled kinds
    /// - the pure-color threshold is negative or not finite
    pub fn validate(&self) -> Result<(), ParamsError> {
        let kinds = self.enabled_kinds();
        if kinds.is_empty() && !self.detect_exact {
            return Err(ParamsError::InvalidConfiguration(
                "no hash kind enabled and exact matching disabled".to_string(),
            ));
        }

        for kind in &kinds {
            let range = kind.supported_sizes();
            if !range.contains(&self.hash_size) {
                return Err(ParamsError::InvalidConfiguration(format!(
                    "hash size {} out of range for {} ({}..={})",
                    self.hash_size,
                    kind,
                    range.start(),
                    range.end()
                )));
            }
        }

        if !kinds.is_empty() && (self.min_matching_kinds == 0 || self.min_matching_kinds > kinds.len()) {
            return Err(ParamsError::InvalidConfiguration(format!(
                "min matching kinds must be between 1 and {} (got {})",
                kinds.len(),
                self.min_matching_kinds
            )));
        }

        if !self.pure_color_threshold.is_finite() || self.pure_color_threshold < 0.0 {
            return Err(ParamsError::InvalidConfiguration(format!(
                "pure color threshold must be a non-negative number (got {})",
                self.pure_color_threshold
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = AnalysisParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.threshold(HashKind::Dhash), 5);
        assert_eq!(params.threshold(HashKind::Phash), 10);
        assert_eq!(params.threshold(HashKind::Ahash), 5);
        assert_eq!(params.rotations(), vec![Rotation::Deg0]);
    }

    #[test]
    fn test_builder_chain() {
        let params = AnalysisParams::default()
            .with_threshold(HashKind::Phash, 3)
            .with_rotation(true)
            .with_kinds(vec![HashKind::Phash, HashKind::Dhash]);
        assert_eq!(params.phash_threshold, 3);
        assert_eq!(params.rotations().len(), 4);
        assert_eq!(params.enabled_kinds(), vec![HashKind::Dhash, HashKind::Phash]);
    }

    #[test]
    fn test_multi_scale_thresholds() {
        let params = AnalysisParams::default();
        assert!(params.scale_percents().is_empty());

        let params = params.with_multi_scale(true);
        assert_eq!(params.scale_percents(), vec![75, 125]);
        assert_eq!(params.scaled_threshold(HashKind::Dhash), 9);
        assert_eq!(params.scaled_threshold(HashKind::Phash), 12);
        assert_eq!(params.scaled_threshold(HashKind::Ahash), 7);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_hash_size_out_of_range() {
        let params = AnalysisParams::default().with_hash_size(1);
        assert!(params.validate().is_err());

        // 40 is fine for dHash alone but not for pHash
        let params = AnalysisParams::default()
            .with_hash_size(40)
            .with_kinds(vec![HashKind::Dhash]);
        assert!(params.validate().is_ok());
        let params = params.with_kinds(vec![HashKind::Phash]);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_min_matching_kinds_bounds() {
        let params = AnalysisParams::default().with_min_matching_kinds(0);
        assert!(params.validate().is_err());
        let params = AnalysisParams::default().with_min_matching_kinds(4);
        assert!(params.validate().is_err());
        let params = AnalysisParams::default().with_min_matching_kinds(3);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_nothing_enabled() {
        let params = AnalysisParams::default().with_kinds(vec![]).with_exact(false);
        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvalidConfiguration(_))
        ));
        // Exact matching alone is a valid run
        let params = AnalysisParams::default().with_kinds(vec![]);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_negative_pure_color_threshold() {
        let params = AnalysisParams::default().with_pure_color_threshold(-1.0);
        assert!(params.validate().is_err());
    }
}
