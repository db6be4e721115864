//! Perceptual image hashing for similarity detection.
//!
//! This module provides the `PerceptualHasher` which computes hashes for
//! images that remain stable under resizing, re-encoding and small edits:
//!
//! - **dHash**: resize to (N+1)×N, one bit per horizontal neighbour pair (`left > right`).
//! - **pHash**: resize to 4N×4N, 2-D DCT, N×N low-frequency corner without the DC
//!   term, one bit per coefficient above the corner's mean.
//! - **aHash**: resize to N×N, one bit per pixel above the mean. Grids whose
//!   standard deviation is below [`PURE_COLOR_STD_FLOOR`] report
//!   [`HashValue::PureColor`] instead of a code.
//!
//! Every algorithm can be run on a cardinal rotation of the image; the rotation
//! is applied losslessly before resizing.

use std::path::Path;

use image::{DynamicImage, GrayImage};
use thiserror::Error;

use super::source::{DecodeError, ImageSource, PixelSource};
use super::{HashCode, HashKind, HashValue, ImageCodes, Rotation};

/// Standard deviation (8-bit scale) below which the aHash grid counts as uniform.
pub const PURE_COLOR_STD_FLOOR: f64 = 3.0;

/// Default hash size (N).
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// Errors that can occur during perceptual hashing.
#[derive(Debug, Error)]
pub enum PerceptualError {
    /// Failed to open or decode the image.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The configured hash size is outside the range supported by the algorithm.
    #[error("Invalid hash size {size} for {kind} (supported: {min}..={max})")]
    InvalidHashSize {
        /// Algorithm being configured
        kind: HashKind,
        /// Requested size
        size: u32,
        /// Smallest supported size
        min: u32,
        /// Largest supported size
        max: u32,
    },

    /// Only the four cardinal angles are supported.
    #[error("Unsupported rotation angle: {0}° (expected 0, 90, 180 or 270)")]
    UnsupportedRotation(u32),
}

/// Computes dHash, pHash and aHash codes for decoded images.
///
/// The hasher holds no mutable state, so a single instance can be shared
/// across worker threads.
#[derive(Debug, Clone)]
pub struct PerceptualHasher<S = ImageSource> {
    source: S,
    hash_size: u32,
}

impl<S: PixelSource> PerceptualHasher<S> {
    /// Create a new hasher using `source` for pixel operations.
    pub fn new(source: S, hash_size: u32) -> Self {
        Self { source, hash_size }
    }

    /// The configured hash size (N).
    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// The pixel source used by this hasher.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Check that the hash size is usable for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `PerceptualError::InvalidHashSize` when out of range.
    pub fn validate(&self, kind: HashKind) -> Result<(), PerceptualError> {
        let range = kind.supported_sizes();
        if range.contains(&self.hash_size) {
            Ok(())
        } else {
            Err(PerceptualError::InvalidHashSize {
                kind,
                size: self.hash_size,
                min: *range.start(),
                max: *range.end(),
            })
        }
    }

    /// Difference hash of a grayscale grid.
    ///
    /// # Errors
    ///
    /// Returns `PerceptualError::InvalidHashSize` if the hash size is unsupported.
    pub fn dhash(&self, gray: &GrayImage) -> Result<HashValue, PerceptualError> {
        self.validate(HashKind::Dhash)?;
        let n = self.hash_size;
        let resized = self.source.resize(gray, n + 1, n);

        let mut bits = Vec::with_capacity((n * n) as usize);
        for y in 0..n {
            for x in 0..n {
                let left = resized.get_pixel(x, y)[0];
                let right = resized.get_pixel(x + 1, y)[0];
                bits.push(left > right);
            }
        }
        Ok(HashValue::Valid(HashCode::from_bits(&bits)))
    }

    /// Perceptual (DCT) hash of a grayscale grid.
    ///
    /// # Errors
    ///
    /// Returns `PerceptualError::InvalidHashSize` if the hash size is unsupported.
    pub fn phash(&self, gray: &GrayImage) -> Result<HashValue, PerceptualError> {
        self.validate(HashKind::Phash)?;
        let n = self.hash_size as usize;
        let size = n * 4;
        let resized = self.source.resize(gray, size as u32, size as u32);

        let samples: Vec<f32> = resized.as_raw().iter().map(|&p| f32::from(p)).collect();
        let coeffs = self.source.frequency_transform(&samples, size);

        // Low-frequency corner, row-major, DC term skipped
        let low: Vec<f32> = (0..n)
            .flat_map(|y| (0..n).map(move |x| (y, x)))
            .filter(|&(y, x)| y != 0 || x != 0)
            .map(|(y, x)| coeffs[y * size + x])
            .collect();
        let mean = low.iter().map(|&c| f64::from(c)).sum::<f64>() / low.len() as f64;

        let bits: Vec<bool> = low.iter().map(|&c| f64::from(c) > mean).collect();
        Ok(HashValue::Valid(HashCode::from_bits(&bits)))
    }

    /// Average hash of a grayscale grid.
    ///
    /// Reports [`HashValue::PureColor`] when the resized grid is nearly uniform.
    ///
    /// # Errors
    ///
    /// Returns `PerceptualError::InvalidHashSize` if the hash size is unsupported.
    pub fn ahash(&self, gray: &GrayImage) -> Result<HashValue, PerceptualError> {
        self.validate(HashKind::Ahash)?;
        let n = self.hash_size;
        let resized = self.source.resize(gray, n, n);

        let stats = self.source.mean_and_std_dev(&resized);
        if stats.std_dev < PURE_COLOR_STD_FLOOR {
            return Ok(HashValue::PureColor);
        }

        let bits: Vec<bool> = resized
            .as_raw()
            .iter()
            .map(|&p| f64::from(p) > stats.mean)
            .collect();
        Ok(HashValue::Valid(HashCode::from_bits(&bits)))
    }

    /// Hash a grayscale grid with `kind` after rotating it by `rotation`.
    ///
    /// # Errors
    ///
    /// Returns `PerceptualError::InvalidHashSize` if the hash size is unsupported.
    pub fn hash(
        &self,
        gray: &GrayImage,
        kind: HashKind,
        rotation: Rotation,
    ) -> Result<HashValue, PerceptualError> {
        if rotation == Rotation::Deg0 {
            return self.hash_unrotated(gray, kind);
        }
        let rotated = self.source.rotate_cardinal(gray, rotation);
        self.hash_unrotated(&rotated, kind)
    }

    fn hash_unrotated(&self, gray: &GrayImage, kind: HashKind) -> Result<HashValue, PerceptualError> {
        match kind {
            HashKind::Dhash => self.dhash(gray),
            HashKind::Phash => self.phash(gray),
            HashKind::Ahash => self.ahash(gray),
        }
    }

    /// Decode the image at `path` and hash it.
    ///
    /// # Errors
    ///
    /// Returns `PerceptualError::Decode` if the image cannot be loaded, or
    /// `PerceptualError::InvalidHashSize` if the hash size is unsupported.
    pub fn hash_path(
        &self,
        path: &Path,
        kind: HashKind,
        rotation: Rotation,
    ) -> Result<HashValue, PerceptualError> {
        let img = self.source.decode(path)?;
        self.hash(&img.to_luma8(), kind, rotation)
    }

    /// Compute every requested kind at every requested rotation.
    ///
    /// Each rotation is materialised once and shared by all kinds. A kind that
    /// cannot run at the configured hash size is stored as
    /// [`HashValue::Failed`] at every rotation so the other kinds stay usable.
    ///
    /// # Errors
    ///
    /// Returns `PerceptualError::InvalidHashSize` if none of the requested
    /// kinds supports the hash size.
    pub fn compute_codes(
        &self,
        img: &DynamicImage,
        kinds: &[HashKind],
        rotations: &[Rotation],
    ) -> Result<ImageCodes, PerceptualError> {
        self.codes_for_grid(&img.to_luma8(), kinds, rotations)
    }

    /// Compute every requested kind at 0° on a copy rescaled to `percent`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`PerceptualHasher::compute_codes`].
    pub fn compute_scaled_codes(
        &self,
        img: &DynamicImage,
        kinds: &[HashKind],
        percent: u32,
    ) -> Result<ImageCodes, PerceptualError> {
        let gray = img.to_luma8();
        let scale = |side: u32| (u64::from(side) * u64::from(percent) / 100).max(1) as u32;
        let scaled = self
            .source
            .resize(&gray, scale(gray.width()), scale(gray.height()));
        self.codes_for_grid(&scaled, kinds, &[Rotation::Deg0])
    }

    fn codes_for_grid(
        &self,
        gray: &GrayImage,
        kinds: &[HashKind],
        rotations: &[Rotation],
    ) -> Result<ImageCodes, PerceptualError> {
        let mut codes = ImageCodes::new();
        let mut usable = Vec::with_capacity(kinds.len());
        let mut first_error = None;
        for &kind in kinds {
            match self.validate(kind) {
                Ok(()) => usable.push(kind),
                Err(e) => {
                    log::debug!("{} unavailable: {}", kind, e);
                    for &rotation in rotations {
                        codes.insert(kind, rotation, HashValue::Failed(e.to_string()));
                    }
                    first_error.get_or_insert(e);
                }
            }
        }
        if let (true, Some(e)) = (usable.is_empty(), first_error) {
            return Err(e);
        }

        for &rotation in rotations {
            let rotated = match rotation {
                Rotation::Deg0 => None,
                other => Some(self.source.rotate_cardinal(gray, other)),
            };
            let grid = rotated.as_ref().unwrap_or(gray);
            for &kind in &usable {
                let value = self.hash_unrotated(grid, kind)?;
                log::trace!("{} at {}: {}", kind, rotation, value);
                codes.insert(kind, rotation, value);
            }
        }
        Ok(codes)
    }
}

impl Default for PerceptualHasher<ImageSource> {
    fn default() -> Self {
        Self::new(ImageSource::new(), DEFAULT_HASH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard(size: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn horizontal_ramp(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / (width - 1)) as u8]))
    }

    #[test]
    fn test_dhash_code_length() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let value = hasher.dhash(&checkerboard(64, 8)).unwrap();
        let code = value.code().unwrap();
        assert_eq!(code.as_str().len(), 16);
        assert_eq!(code.bit_len(), 64);
    }

    #[test]
    fn test_dhash_decreasing_ramp_is_all_ones() {
        // Brightness falls left to right, so every left > right comparison holds
        let ramp = GrayImage::from_fn(90, 80, |x, _| Luma([(255 - x * 2) as u8]));
        let hasher = PerceptualHasher::<ImageSource>::default();
        let value = hasher.dhash(&ramp).unwrap();
        assert_eq!(value.code().unwrap().as_str(), "ffffffffffffffff");
    }

    #[test]
    fn test_dhash_increasing_ramp_is_all_zeros() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let value = hasher.dhash(&horizontal_ramp(90, 80)).unwrap();
        assert_eq!(value.code().unwrap().as_str(), "0000000000000000");
    }

    #[test]
    fn test_phash_code_length() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let value = hasher.phash(&checkerboard(64, 8)).unwrap();
        let code = value.code().unwrap();
        assert_eq!(code.bit_len(), 63);
        assert_eq!(code.as_str().len(), 16);
        // Trailing padding bit of the last nibble is always zero
        let last = code.as_str().chars().last().unwrap().to_digit(16).unwrap();
        assert_eq!(last & 1, 0);
    }

    #[test]
    fn test_ahash_uniform_is_pure_color() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let flat = GrayImage::from_pixel(20, 20, Luma([128]));
        assert_eq!(hasher.ahash(&flat).unwrap(), HashValue::PureColor);
    }

    #[test]
    fn test_ahash_split_image() {
        // Left half dark, right half bright
        let img = GrayImage::from_fn(64, 64, |x, _| if x < 32 { Luma([0]) } else { Luma([255]) });
        let hasher = PerceptualHasher::<ImageSource>::default();
        let value = hasher.ahash(&img).unwrap();
        assert_eq!(value.code().unwrap().as_str(), "0f0f0f0f0f0f0f0f");
    }

    #[test]
    fn test_invalid_hash_size() {
        let hasher = PerceptualHasher::new(ImageSource::new(), 1);
        assert!(matches!(
            hasher.dhash(&checkerboard(16, 4)),
            Err(PerceptualError::InvalidHashSize { .. })
        ));

        let hasher = PerceptualHasher::new(ImageSource::new(), 33);
        assert!(hasher.validate(HashKind::Dhash).is_ok());
        assert!(hasher.validate(HashKind::Phash).is_err());
    }

    #[test]
    fn test_determinism() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let img = checkerboard(48, 6);
        for kind in HashKind::ALL {
            assert_eq!(
                hasher.hash(&img, kind, Rotation::Deg0).unwrap(),
                hasher.hash(&img, kind, Rotation::Deg0).unwrap()
            );
        }
    }

    #[test]
    fn test_rotated_hash_matches_hash_of_rotated_image() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let source = ImageSource::new();
        let img = horizontal_ramp(64, 48);
        let rotated = source.rotate_cardinal(&img, Rotation::Deg90);
        for kind in HashKind::ALL {
            assert_eq!(
                hasher.hash(&img, kind, Rotation::Deg90).unwrap(),
                hasher.hash(&rotated, kind, Rotation::Deg0).unwrap()
            );
        }
    }

    #[test]
    fn test_compute_codes_fills_requested_entries() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let img = DynamicImage::ImageLuma8(checkerboard(32, 4));
        let codes = hasher
            .compute_codes(&img, &HashKind::ALL, &Rotation::ALL)
            .unwrap();
        assert_eq!(codes.len(), 12);

        let codes = hasher
            .compute_codes(&img, &[HashKind::Phash], &[Rotation::Deg0])
            .unwrap();
        assert_eq!(codes.len(), 1);
        assert!(codes.get(HashKind::Phash, Rotation::Deg0).is_some());
    }

    #[test]
    fn test_unsupported_kind_marked_failed() {
        let hasher = PerceptualHasher::new(ImageSource::new(), 48);
        let img = DynamicImage::ImageLuma8(checkerboard(96, 8));
        let codes = hasher
            .compute_codes(&img, &[HashKind::Dhash, HashKind::Phash], &[Rotation::Deg0, Rotation::Deg90])
            .unwrap();

        assert!(codes.get(HashKind::Dhash, Rotation::Deg90).and_then(HashValue::code).is_some());
        for rotation in [Rotation::Deg0, Rotation::Deg90] {
            assert!(matches!(
                codes.get(HashKind::Phash, rotation),
                Some(HashValue::Failed(msg)) if msg.contains("48")
            ));
        }

        // Nothing computable is still an error
        assert!(matches!(
            hasher.compute_codes(&img, &[HashKind::Phash], &[Rotation::Deg0]),
            Err(PerceptualError::InvalidHashSize { .. })
        ));
    }

    #[test]
    fn test_scaled_codes() {
        let hasher = PerceptualHasher::<ImageSource>::default();
        let img = DynamicImage::ImageLuma8(checkerboard(64, 8));
        for percent in [75, 125] {
            let codes = hasher
                .compute_scaled_codes(&img, &HashKind::ALL, percent)
                .unwrap();
            assert_eq!(codes.len(), 3);
            for kind in HashKind::ALL {
                let code = codes.get(kind, Rotation::Deg0).and_then(HashValue::code).unwrap();
                assert_eq!(code.bit_len(), kind.bit_len(8));
            }
        }
    }
}
