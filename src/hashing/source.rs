//! Pixel operations consumed by the hashers.
//!
//! [`PixelSource`] is the narrow interface between the hashing engine and the
//! imaging backend. [`ImageSource`] implements it with the `image` crate for
//! decoding, resizing and lossless rotations, and `rustdct` for the 2-D DCT.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use rustdct::{Dct2, DctPlanner};
use thiserror::Error;

use super::Rotation;

/// Errors that can occur while decoding an image.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// The file could not be opened or decoded as an image.
    #[error("Failed to load image {path}: {source}")]
    Image {
        /// Path of the image
        path: PathBuf,
        /// The underlying decoder error
        #[source]
        source: image::ImageError,
    },

    /// An in-memory buffer could not be decoded.
    #[error("Failed to decode image buffer: {0}")]
    Buffer(#[source] image::ImageError),
}

/// Mean and population standard deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelStats {
    /// Arithmetic mean
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl ChannelStats {
    /// Compute statistics over a sequence of samples.
    ///
    /// An empty sequence yields zero mean and zero deviation.
    #[must_use]
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = samples.into_iter().collect();
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// Decoding and pixel-grid operations needed by the hashers.
///
/// Implementations must be stateless with respect to individual calls so that
/// independent images can be processed concurrently.
pub trait PixelSource: Send + Sync {
    /// Decode the image stored at `path`.
    fn decode(&self, path: &Path) -> Result<DynamicImage, DecodeError>;

    /// Decode an image from an in-memory buffer.
    fn decode_bytes(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError>;

    /// Resample a grayscale grid to exactly `width` x `height`.
    fn resize(&self, grid: &GrayImage, width: u32, height: u32) -> GrayImage;

    /// Rotate a grayscale grid by a cardinal angle without interpolation.
    fn rotate_cardinal(&self, grid: &GrayImage, rotation: Rotation) -> GrayImage;

    /// 2-D frequency transform of a `size` x `size` row-major sample block.
    fn frequency_transform(&self, samples: &[f32], size: usize) -> Vec<f32>;

    /// Mean and standard deviation of a grayscale grid.
    fn mean_and_std_dev(&self, grid: &GrayImage) -> ChannelStats {
        ChannelStats::from_samples(grid.as_raw().iter().map(|&p| f64::from(p)))
    }
}

/// [`PixelSource`] backed by the `image` crate and `rustdct`.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource {
    filter: FilterType,
}

impl ImageSource {
    /// Create a source using bilinear resampling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    /// Use a different resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for ImageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSource for ImageSource {
    fn decode(&self, path: &Path) -> Result<DynamicImage, DecodeError> {
        if !path.exists() {
            return Err(DecodeError::NotFound(path.to_path_buf()));
        }
        image::open(path).map_err(|source| DecodeError::Image {
            path: path.to_path_buf(),
            source,
        })
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
        image::load_from_memory(bytes).map_err(DecodeError::Buffer)
    }

    fn resize(&self, grid: &GrayImage, width: u32, height: u32) -> GrayImage {
        if grid.dimensions() == (width, height) {
            return grid.clone();
        }
        imageops::resize(grid, width, height, self.filter)
    }

    fn rotate_cardinal(&self, grid: &GrayImage, rotation: Rotation) -> GrayImage {
        match rotation {
            Rotation::Deg0 => grid.clone(),
            Rotation::Deg90 => imageops::rotate90(grid),
            Rotation::Deg180 => imageops::rotate180(grid),
            Rotation::Deg270 => imageops::rotate270(grid),
        }
    }

    fn frequency_transform(&self, samples: &[f32], size: usize) -> Vec<f32> {
        debug_assert_eq!(samples.len(), size * size);
        let mut planner = DctPlanner::new();
        let dct = planner.plan_dct2(size);

        // Rows, then columns via transpose
        let mut buffer = samples.to_vec();
        for row in buffer.chunks_exact_mut(size) {
            dct.process_dct2(row);
        }
        let mut columns = transpose(&buffer, size);
        for column in columns.chunks_exact_mut(size) {
            dct.process_dct2(column);
        }
        transpose(&columns, size)
    }
}

/// Transpose a square row-major matrix.
fn transpose(matrix: &[f32], size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; matrix.len()];
    for y in 0..size {
        for x in 0..size {
            out[x * size + y] = matrix[y * size + x];
        }
    }
    out
}
