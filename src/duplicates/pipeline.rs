//! Analysis pipeline orchestrating hashing and grouping.
//!
//! # Overview
//!
//! The pipeline runs a batch of images through these stages:
//! 1. **Walk** (directory input only): discover image files in sorted order
//! 2. **Hash**: for each image in parallel, decode it, classify it as
//!    pure-color or not, compute the enabled hash kinds at the enabled
//!    rotations (and rescaled copies in multi-scale mode), and fingerprint the
//!    file. Pixel data is dropped as soon as the codes are derived.
//! 3. **Confirm**: files whose sampled fingerprints collide get a full-content
//!    digest, so only byte-identical files match as "identical file"
//! 4. **Group**: cluster the compact records with [`GroupingEngine`]
//!
//! A decode failure is recorded against that image and never aborts the batch.
//! Only when no image at all could be decoded does the result carry a
//! top-level error.
//!
//! # Example
//!
//! ```no_run
//! use pixeldupe::duplicates::{AnalysisParams, AnalysisPipeline};
//! use std::path::Path;
//!
//! let pipeline = AnalysisPipeline::new(AnalysisParams::default()).with_threads(4);
//! let result = pipeline.analyze_directory(Path::new("photos")).unwrap();
//!
//! println!(
//!     "{} images, {} duplicates in {} groups",
//!     result.total_images,
//!     result.duplicate_images,
//!     result.groups.len()
//! );
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use super::groups::{has_pure_color_code, DuplicateGroup, GroupingEngine, ImageRecord};
use super::params::{AnalysisParams, ParamsError};
use crate::hashing::{
    FileFingerprinter, Fingerprint, ImageSource, PerceptualHasher, PixelSource,
    PureColorClassifier,
};
use crate::progress::{ProgressCallback, PHASE_GROUPING, PHASE_HASHING, PHASE_WALKING};
use crate::scanner::{ScanConfig, ScanError, Walker};

/// Errors that abort an analysis run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The parameters are unusable.
    #[error(transparent)]
    InvalidConfiguration(#[from] ParamsError),

    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Analysis interrupted by user")]
    Interrupted,

    /// The input directory could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The worker pool could not be created.
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// An image that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFailure {
    /// Path of the image
    pub path: PathBuf,
    /// Human-readable failure description
    pub message: String,
}

/// Outcome of an analysis run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResult {
    /// Number of images decoded successfully
    pub total_images: usize,
    /// Number of images that duplicate a group reference
    pub duplicate_images: usize,
    /// Number of pure-color images
    pub pure_color_images: usize,
    /// Duplicate groups ordered by reference
    pub groups: Vec<DuplicateGroup>,
    /// Pure-color images in input order
    pub pure_color_paths: Vec<PathBuf>,
    /// Images that could not be decoded or hashed
    pub failures: Vec<ImageFailure>,
    /// Set when the run produced no usable results
    pub error: Option<String>,
    /// Wall-clock duration of the run
    #[serde(skip)]
    pub duration: Duration,
    /// When the run finished
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    fn empty(duration: Duration) -> Self {
        Self {
            duration,
            completed_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Whether any duplicate group was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of groups per reason string, in first-seen order.
    #[must_use]
    pub fn reason_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for group in &self.groups {
            match counts.iter_mut().find(|(reason, _)| *reason == group.reason) {
                Some((_, count)) => *count += 1,
                None => counts.push((group.reason.clone(), 1)),
            }
        }
        counts
    }
}

enum ImageOutcome {
    Analyzed(ImageRecord),
    Failed(ImageFailure),
    Skipped,
}

/// Batch analysis orchestrator.
pub struct AnalysisPipeline<S = ImageSource> {
    params: AnalysisParams,
    hasher: PerceptualHasher<S>,
    classifier: PureColorClassifier,
    fingerprinter: FileFingerprinter,
    scan: ScanConfig,
    threads: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for AnalysisPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("params", &self.params)
            .field("hasher", &self.hasher)
            .field("scan", &self.scan)
            .field("threads", &self.threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl AnalysisPipeline<ImageSource> {
    /// Create a pipeline using the default image backend.
    #[must_use]
    pub fn new(params: AnalysisParams) -> Self {
        Self::with_pixel_source(params, ImageSource::new())
    }
}

impl<S: PixelSource> AnalysisPipeline<S> {
    /// Create a pipeline using a custom pixel source.
    #[must_use]
    pub fn with_pixel_source(params: AnalysisParams, source: S) -> Self {
        let hasher = PerceptualHasher::new(source, params.hash_size);
        let classifier = PureColorClassifier::new(params.pure_color_threshold);
        Self {
            params,
            hasher,
            classifier,
            fingerprinter: FileFingerprinter::new(),
            scan: ScanConfig::default(),
            threads: 0,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the walk options for directory input.
    ///
    /// Recursion is always taken from the parameters.
    #[must_use]
    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    /// Set the number of worker threads (0 uses all cores).
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the shutdown flag polled between images.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The parameters of this pipeline.
    #[must_use]
    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Discover images below `root` and analyze them.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if the parameters are invalid, the root cannot
    /// be scanned, or the run is interrupted.
    pub fn analyze_directory(&self, root: &Path) -> Result<AnalysisResult, PipelineError> {
        self.params.validate()?;
        let paths = self.collect_images(root)?;
        self.analyze_files(paths)
    }

    /// Discover image files below `root` in sorted order.
    ///
    /// Entry-level walk errors are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Scan` if the root is missing or not a directory,
    /// or `PipelineError::Interrupted` if shutdown was requested.
    pub fn collect_images(&self, root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let config = self.scan.clone().with_recursive(self.params.recursive_scan);
        let mut walker = Walker::new(root, config);
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        walker.validate_root()?;

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_WALKING, 0);
        }
        log::info!("Scanning {} for images", root.display());

        let mut paths = Vec::new();
        for entry in walker.walk() {
            match entry {
                Ok(path) => {
                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(paths.len() + 1, &path.to_string_lossy());
                    }
                    paths.push(path);
                }
                Err(e) => log::warn!("Skipping entry: {}", e),
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_WALKING);
        }
        if self.is_shutdown_requested() {
            return Err(PipelineError::Interrupted);
        }

        log::info!("Found {} images", paths.len());
        Ok(paths)
    }

    /// Analyze an explicit list of image files.
    ///
    /// Input order determines record ids and therefore group references.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if the parameters are invalid, the worker pool
    /// cannot be built, or the run is interrupted.
    pub fn analyze_files(&self, paths: Vec<PathBuf>) -> Result<AnalysisResult, PipelineError> {
        self.params.validate()?;
        let start_time = Instant::now();

        if paths.is_empty() {
            log::info!("No images to analyze");
            return Ok(AnalysisResult::empty(start_time.elapsed()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?;

        let outcomes = self.hash_all(&pool, &paths);
        if self.is_shutdown_requested() {
            return Err(PipelineError::Interrupted);
        }

        let mut records = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                ImageOutcome::Analyzed(record) => records.push(record),
                ImageOutcome::Failed(failure) => failures.push(failure),
                ImageOutcome::Skipped => {}
            }
        }

        if records.is_empty() {
            log::error!("None of the {} images could be decoded", failures.len());
            let mut result = AnalysisResult::empty(start_time.elapsed());
            result.error = Some(format!(
                "no image could be decoded ({} failed)",
                failures.len()
            ));
            result.failures = failures;
            return Ok(result);
        }

        self.confirm_exact(&pool, &mut records);
        if self.is_shutdown_requested() {
            return Err(PipelineError::Interrupted);
        }

        let groups = self.group_records(&records);
        if self.is_shutdown_requested() {
            return Err(PipelineError::Interrupted);
        }

        let pure_color_paths: Vec<PathBuf> = records
            .iter()
            .filter(|r| r.pure_color)
            .map(|r| r.path.clone())
            .collect();
        let duplicate_images = groups.iter().map(|g| g.len() - 1).sum();

        let result = AnalysisResult {
            total_images: records.len(),
            duplicate_images,
            pure_color_images: pure_color_paths.len(),
            groups,
            pure_color_paths,
            failures,
            error: None,
            duration: start_time.elapsed(),
            completed_at: Utc::now(),
        };

        log::info!(
            "Analysis complete: {} images, {} groups, {} duplicates, {} pure color, {} failed ({:.2?})",
            result.total_images,
            result.groups.len(),
            result.duplicate_images,
            result.pure_color_images,
            result.failures.len(),
            result.duration
        );
        Ok(result)
    }

    /// Decode and hash every image on a bounded worker pool.
    fn hash_all(&self, pool: &rayon::ThreadPool, paths: &[PathBuf]) -> Vec<ImageOutcome> {
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_HASHING, paths.len());
        }
        log::info!("Hashing {} images", paths.len());

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<ImageOutcome> = pool.install(|| {
            paths
                .par_iter()
                .enumerate()
                .map(|(id, path)| {
                    if self.is_shutdown_requested() {
                        return ImageOutcome::Skipped;
                    }
                    let outcome = self.analyze_image(id, path);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(done, &path.to_string_lossy());
                    }
                    outcome
                })
                .collect()
        });

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(PHASE_HASHING);
        }
        outcomes
    }

    /// Digest the full contents of files whose fingerprints collide.
    ///
    /// Records outside a collision keep no digest and can never match as
    /// identical files.
    fn confirm_exact(&self, pool: &rayon::ThreadPool, records: &mut [ImageRecord]) {
        if !self.params.detect_exact {
            return;
        }

        let mut buckets: HashMap<Fingerprint, usize> = HashMap::new();
        for record in records.iter().filter(|r| !r.pure_color) {
            if let Some(fp) = record.fingerprint {
                *buckets.entry(fp).or_default() += 1;
            }
        }
        let colliding = |record: &ImageRecord| {
            !record.pure_color
                && record
                    .fingerprint
                    .is_some_and(|fp| buckets.get(&fp).is_some_and(|&count| count > 1))
        };

        let candidates = records.iter().filter(|r| colliding(r)).count();
        if candidates == 0 {
            return;
        }
        log::debug!("Confirming {} fingerprint collisions by full content", candidates);

        pool.install(|| {
            records
                .par_iter_mut()
                .filter(|r| colliding(r))
                .for_each(|record| {
                    if self.is_shutdown_requested() {
                        return;
                    }
                    match self.fingerprinter.content_digest(&record.path) {
                        Ok(digest) => record.content_digest = Some(digest),
                        Err(e) => {
                            log::warn!("Failed to digest {}: {}", record.path.display(), e);
                        }
                    }
                });
        });
    }

    /// Build the record for one image.
    fn analyze_image(&self, id: usize, path: &Path) -> ImageOutcome {
        let img = match self.hasher.source().decode(path) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Failed to decode {}: {}", path.display(), e);
                return ImageOutcome::Failed(ImageFailure {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
            }
        };

        let sampled_pure = self.params.detect_pure_color
            && self.classifier.classify_image(&img).is_pure_color();

        let kinds = self.params.enabled_kinds();
        let codes = match self.hasher.compute_codes(&img, &kinds, &self.params.rotations()) {
            Ok(codes) => codes,
            Err(e) => {
                log::warn!("Failed to hash {}: {}", path.display(), e);
                return ImageOutcome::Failed(ImageFailure {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
            }
        };
        let pure_color =
            sampled_pure || (self.params.detect_pure_color && has_pure_color_code(&codes));
        if pure_color {
            log::debug!("Pure color image: {}", path.display());
        }

        let mut record = ImageRecord::new(id, path.to_path_buf(), codes).with_pure_color(pure_color);
        if !pure_color {
            for percent in self.params.scale_percents() {
                match self.hasher.compute_scaled_codes(&img, &kinds, percent) {
                    Ok(scaled) => record = record.with_scaled_codes(percent, scaled),
                    Err(e) => log::warn!("Failed to hash {} at {}%: {}", path.display(), percent, e),
                }
            }
        }
        drop(img);

        if self.params.detect_exact {
            match self.fingerprinter.fingerprint(path) {
                Ok(fp) => record = record.with_fingerprint(fp),
                Err(e) => log::warn!("Failed to fingerprint {}: {}", path.display(), e),
            }
        }
        log::trace!("Computed {} hash values for {}", record.codes.len(), path.display());
        ImageOutcome::Analyzed(record)
    }

    fn group_records(&self, records: &[ImageRecord]) -> Vec<DuplicateGroup> {
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(PHASE_GROUPING, records.len());
        }
        log::info!("Grouping {} images", records.len());

        let groups = GroupingEngine::new(self.params.clone()).group(records);

        if let Some(ref callback) = self.progress_callback {
            callback.on_progress(records.len(), "");
            callback.on_phase_end(PHASE_GROUPING);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Horizontal gradient, brightening left to right or right to left.
    fn write_gradient(dir: &Path, name: &str, rising: bool) -> PathBuf {
        let path = dir.join(name);
        let img = GrayImage::from_fn(64, 64, |x, _| {
            let v = (x * 4) as u8;
            Luma([if rising { v } else { 255 - v }])
        });
        img.save(&path).unwrap();
        path
    }

    struct RecordingCallback {
        phases: Mutex<Vec<String>>,
    }

    impl ProgressCallback for RecordingCallback {
        fn on_phase_start(&self, phase: &str, _total: usize) {
            self.phases.lock().unwrap().push(phase.to_string());
        }
        fn on_progress(&self, _current: usize, _path: &str) {}
        fn on_phase_end(&self, _phase: &str) {}
    }

    #[test]
    fn test_empty_input() {
        let result = AnalysisPipeline::new(AnalysisParams::default())
            .analyze_files(Vec::new())
            .unwrap();
        assert_eq!(result.total_images, 0);
        assert!(result.error.is_none());
        assert!(!result.has_duplicates());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = AnalysisParams::default().with_hash_size(0);
        let err = AnalysisPipeline::new(params)
            .analyze_files(vec![PathBuf::from("a.png")])
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_copies_are_grouped() {
        let dir = TempDir::new().unwrap();
        let a = write_gradient(dir.path(), "a.png", true);
        let b = dir.path().join("b.png");
        std::fs::copy(&a, &b).unwrap();
        let c = write_gradient(dir.path(), "c.png", false);

        let result = AnalysisPipeline::new(AnalysisParams::default())
            .with_threads(2)
            .analyze_files(vec![a.clone(), b.clone(), c])
            .unwrap();

        assert_eq!(result.total_images, 3);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.duplicate_images, 1);
        assert_eq!(result.groups[0].members[0].path, a);
        assert_eq!(result.groups[0].members[1].path, b);
        assert!(result.groups[0].reason.starts_with("identical file"));
    }

    #[test]
    fn test_all_failures_reported_as_error() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not really a png").unwrap();

        let result = AnalysisPipeline::new(AnalysisParams::default())
            .analyze_files(vec![bogus])
            .unwrap();
        assert!(result.error.is_some());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.total_images, 0);
    }

    #[test]
    fn test_interrupted_before_start() {
        let dir = TempDir::new().unwrap();
        let a = write_gradient(dir.path(), "a.png", true);
        let flag = Arc::new(AtomicBool::new(true));
        let err = AnalysisPipeline::new(AnalysisParams::default())
            .with_shutdown_flag(flag)
            .analyze_files(vec![a])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Interrupted));
    }

    #[test]
    fn test_phases_reported() {
        let dir = TempDir::new().unwrap();
        write_gradient(dir.path(), "a.png", true);
        let callback = Arc::new(RecordingCallback {
            phases: Mutex::new(Vec::new()),
        });
        AnalysisPipeline::new(AnalysisParams::default())
            .with_progress_callback(callback.clone())
            .analyze_directory(dir.path())
            .unwrap();
        assert_eq!(
            *callback.phases.lock().unwrap(),
            vec![PHASE_WALKING, PHASE_HASHING, PHASE_GROUPING]
        );
    }

    #[test]
    fn test_missing_directory() {
        let err = AnalysisPipeline::new(AnalysisParams::default())
            .analyze_directory(Path::new("/definitely/missing/dir"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Scan(ScanError::NotFound(_))));
    }

    #[test]
    fn test_reason_counts() {
        let mut result = AnalysisResult::empty(Duration::ZERO);
        for reason in ["dHash", "pHash", "dHash"] {
            result.groups.push(DuplicateGroup {
                id: result.groups.len() + 1,
                reason: reason.to_string(),
                criteria: Vec::new(),
                members: Vec::new(),
            });
        }
        assert_eq!(
            result.reason_counts(),
            vec![("dHash".to_string(), 2), ("pHash".to_string(), 1)]
        );
    }
}
