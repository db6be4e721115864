//! Detection of visually uniform images.
//!
//! A pure-color image (blank scans, solid placeholders, black frames) carries
//! too little structure for perceptual hashes to discriminate, so such images
//! are reported separately instead of being clustered.
//!
//! The classifier samples a regular grid of pixels spaced
//! `max(1, min(width, height) / 10)` apart and computes the standard deviation
//! of each RGB channel across the samples. The image is pure-color when every
//! channel deviation stays below the configured threshold.

use std::fmt;
use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::source::{ChannelStats, PixelSource};

/// Default per-channel standard deviation threshold.
pub const DEFAULT_PURE_COLOR_THRESHOLD: f64 = 3.0;

/// Outcome of a pure-color check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PureColorVerdict {
    /// The image is visually uniform.
    PureColor,
    /// The image has enough structure to hash.
    NotPureColor,
    /// The check could not run (the image failed to decode).
    Indeterminate(String),
}

impl PureColorVerdict {
    /// Whether the verdict counts as pure-color.
    ///
    /// `Indeterminate` counts as not pure-color.
    #[must_use]
    pub fn is_pure_color(&self) -> bool {
        matches!(self, Self::PureColor)
    }
}

impl fmt::Display for PureColorVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PureColor => write!(f, "pure color"),
            Self::NotPureColor => write!(f, "not pure color"),
            Self::Indeterminate(reason) => write!(f, "indeterminate ({})", reason),
        }
    }
}

/// Grid-sampling classifier for uniform images.
#[derive(Debug, Clone, Copy)]
pub struct PureColorClassifier {
    threshold: f64,
}

impl PureColorClassifier {
    /// Images with either side below this many pixels are pure-color by policy.
    pub const MIN_DIMENSION: u32 = 10;

    /// Create a classifier with the given per-channel deviation threshold.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// The configured threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify an already decoded image.
    #[must_use]
    pub fn classify_image(&self, img: &DynamicImage) -> PureColorVerdict {
        let (width, height) = (img.width(), img.height());
        if width < Self::MIN_DIMENSION || height < Self::MIN_DIMENSION {
            log::trace!("Image {}x{} too small to hash, treating as pure color", width, height);
            return PureColorVerdict::PureColor;
        }

        let stats = self.channel_stats(img);
        if stats.iter().all(|s| s.std_dev < self.threshold) {
            PureColorVerdict::PureColor
        } else {
            PureColorVerdict::NotPureColor
        }
    }

    /// Decode the image at `path` through `source` and classify it.
    ///
    /// Decode failures yield [`PureColorVerdict::Indeterminate`].
    pub fn classify_path<S: PixelSource>(&self, source: &S, path: &Path) -> PureColorVerdict {
        match source.decode(path) {
            Ok(img) => self.classify_image(&img),
            Err(e) => PureColorVerdict::Indeterminate(e.to_string()),
        }
    }

    /// Per-channel statistics over the sampling grid (R, G, B).
    #[must_use]
    pub fn channel_stats(&self, img: &DynamicImage) -> [ChannelStats; 3] {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let step = (width.min(height) / 10).max(1) as usize;

        let samples: Vec<[u8; 3]> = (0..height)
            .step_by(step)
            .flat_map(|y| (0..width).step_by(step).map(move |x| (x, y)))
            .map(|(x, y)| rgb.get_pixel(x, y).0)
            .collect();

        let channel = |c: usize| ChannelStats::from_samples(samples.iter().map(|p| f64::from(p[c])));
        [channel(0), channel(1), channel(2)]
    }
}

impl Default for PureColorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PURE_COLOR_THRESHOLD)
    }
}
