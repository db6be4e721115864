//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`ProgressCallback`] trait consumed by the analysis
//! pipeline and the [`Progress`] struct which renders it as terminal progress
//! bars. The pipeline reports three phases:
//!
//! - `"walking"`: directory discovery (spinner, no known total)
//! - `"hashing"`: per-image decode, classification and hashing
//! - `"grouping"`: pairwise comparison and clustering

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name for directory discovery.
pub const PHASE_WALKING: &str = "walking";
/// Phase name for per-image hashing.
pub const PHASE_HASHING: &str = "hashing";
/// Phase name for clustering.
pub const PHASE_GROUPING: &str = "grouping";

/// Progress callback for analysis phases.
///
/// Implement this trait to receive progress updates during the pipeline.
/// Implementations must be cheap and must not block; they are called from
/// worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (see the `PHASE_*` constants)
    /// * `total` - Total number of items to process (0 if unknown)
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Number of items completed so far
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<(String, ProgressBar)>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pixeldupe::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} images")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn with_active(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.active.lock() {
            if let Some((_, pb)) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if phase == PHASE_WALKING {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.set_message("Scanning for images");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style());
            pb.set_message(match phase {
                PHASE_HASHING => "Hashing images".to_string(),
                PHASE_GROUPING => "Comparing images".to_string(),
                other => other.to_string(),
            });
            pb
        };

        if let Ok(mut active) = self.active.lock() {
            if let Some((_, previous)) = active.take() {
                previous.finish_and_clear();
            }
            *active = Some((phase.to_string(), pb));
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        let message = truncate_path(path, 30);
        self.with_active(|pb| {
            pb.set_position(current as u64);
            pb.set_message(message);
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|(name, _)| name == phase) {
                if let Some((_, pb)) = active.take() {
                    pb.finish_with_message(format!("{} complete", capitalize(phase)));
                }
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        let message = message.to_string();
        self.with_active(|pb| pb.set_message(message));
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.chars().count() >= max_len {
        let tail: String = file_name
            .chars()
            .rev()
            .take(max_len - 3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_path() {
        assert_eq!(truncate_path("a.png", 30), "a.png");
    }

    #[test]
    fn test_truncate_long_path_keeps_file_name() {
        let path = "/very/long/directory/structure/for/testing/photo.png";
        assert_eq!(truncate_path(path, 30), ".../photo.png");
    }

    #[test]
    fn test_truncate_long_file_name() {
        let name = "a".repeat(40) + ".png";
        let truncated = truncate_path(&name, 30);
        assert!(truncated.starts_with("..."));
        assert_eq!(truncated.chars().count(), 30);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("hashing"), "Hashing");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_quiet_progress_is_noop() {
        let progress = Progress::new(true);
        progress.on_phase_start(PHASE_HASHING, 10);
        progress.on_progress(1, "a.png");
        progress.on_phase_end(PHASE_HASHING);
    }
}
