//! Image fingerprinting: perceptual hashes, distances and pure-color detection.
//!
//! This module provides functionality for:
//! - Encoding comparison bits into hexadecimal hash codes
//! - Computing dHash, pHash and aHash (with cardinal rotation variants)
//! - Hamming distance between hash codes
//! - Detecting visually uniform ("pure color") images
//! - Cheap file fingerprints for exact duplicate detection
//! - Rescaled copies for multi-scale comparison
//!
//! # Architecture
//!
//! The hashing layer is divided into submodules:
//! - [`codec`]: Bit to hex packing ([`HashCodec`])
//! - [`source`]: Decoding and pixel operations ([`PixelSource`], [`ImageSource`])
//! - [`perceptual`]: The three perceptual hash algorithms ([`PerceptualHasher`])
//! - [`distance`]: Hamming distance between codes ([`DistanceEngine`])
//! - [`pure_color`]: Uniform image classifier ([`PureColorClassifier`])
//! - [`fingerprint`]: Sampled content signature ([`FileFingerprinter`])
//!
//! # Example
//!
//! ```no_run
//! use pixeldupe::hashing::{HashKind, ImageSource, PerceptualHasher, Rotation};
//! use std::path::Path;
//!
//! let hasher = PerceptualHasher::new(ImageSource::new(), 8);
//! let code = hasher
//!     .hash_path(Path::new("photo.png"), HashKind::Phash, Rotation::Deg0)
//!     .unwrap();
//! println!("pHash: {}", code);
//! ```

pub mod codec;
pub mod distance;
pub mod fingerprint;
pub mod perceptual;
pub mod pure_color;
pub mod source;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// Re-export main types
pub use codec::{CodecError, HashCodec};
pub use distance::{DistanceEngine, DistanceError};
pub use fingerprint::{ContentDigest, FileFingerprinter, Fingerprint, FingerprintError};
pub use perceptual::{PerceptualError, PerceptualHasher, PURE_COLOR_STD_FLOOR};
pub use pure_color::{PureColorClassifier, PureColorVerdict};
pub use source::{ChannelStats, DecodeError, ImageSource, PixelSource};

/// Scales (percent of the original size) hashed for multi-scale comparison.
///
/// The original size is always available through the regular codes.
pub const MULTI_SCALE_PERCENTS: [u32; 2] = [75, 125];

/// Supported perceptual hashing algorithms.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    /// dHash (Difference Hash) - sign of horizontal gradients.
    Dhash,
    /// pHash (Perceptual Hash) - thresholded low-frequency DCT coefficients.
    Phash,
    /// aHash (Average Hash) - pixels compared against the mean intensity.
    Ahash,
}

impl HashKind {
    /// All hash kinds, in reporting order.
    pub const ALL: [HashKind; 3] = [HashKind::Dhash, HashKind::Phash, HashKind::Ahash];

    /// Get the default similarity threshold (Hamming distance) for this algorithm.
    #[must_use]
    pub fn default_threshold(&self) -> u32 {
        match self {
            Self::Dhash => 5,
            Self::Phash => 10,
            Self::Ahash => 5,
        }
    }

    /// Extra distance allowed when comparing across scales.
    #[must_use]
    pub fn scale_slack(&self) -> u32 {
        match self {
            Self::Dhash => 4,
            Self::Phash | Self::Ahash => 2,
        }
    }

    /// Number of comparison bits a code of this kind carries for hash size `n`.
    ///
    /// pHash drops the DC coefficient, so it carries `n² - 1` bits.
    #[must_use]
    pub fn bit_len(&self, hash_size: u32) -> u32 {
        let square = hash_size * hash_size;
        match self {
            Self::Phash => square.saturating_sub(1),
            Self::Dhash | Self::Ahash => square,
        }
    }

    /// Smallest and largest hash size accepted for this algorithm.
    #[must_use]
    pub fn supported_sizes(&self) -> std::ops::RangeInclusive<u32> {
        match self {
            Self::Phash => 2..=32,
            Self::Dhash | Self::Ahash => 2..=64,
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dhash => write!(f, "dHash"),
            Self::Phash => write!(f, "pHash"),
            Self::Ahash => write!(f, "aHash"),
        }
    }
}

impl std::str::FromStr for HashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dhash" => Ok(Self::Dhash),
            "phash" => Ok(Self::Phash),
            "ahash" => Ok(Self::Ahash),
            other => Err(format!(
                "unknown hash kind '{}' (expected dhash, phash or ahash)",
                other
            )),
        }
    }
}

/// Lossless cardinal rotation applied before hashing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Rotation {
    /// No rotation.
    #[default]
    #[serde(rename = "0")]
    Deg0,
    /// 90 degrees clockwise.
    #[serde(rename = "90")]
    Deg90,
    /// 180 degrees.
    #[serde(rename = "180")]
    Deg180,
    /// 270 degrees clockwise (90 counter-clockwise).
    #[serde(rename = "270")]
    Deg270,
}

impl Rotation {
    /// All cardinal rotations in ascending angle order.
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Angle in degrees.
    #[must_use]
    pub fn degrees(&self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Position of this rotation inside [`Rotation::ALL`].
    #[must_use]
    pub fn index(&self) -> usize {
        (self.degrees() / 90) as usize
    }
}

impl TryFrom<u32> for Rotation {
    type Error = PerceptualError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees % 360 {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(PerceptualError::UnsupportedRotation(degrees)),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// A fixed-length lowercase hexadecimal hash code.
///
/// Carries the number of meaningful bits so that the maximum distance is known
/// even though the last nibble may be zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashCode {
    hex: String,
    bits: u32,
}

impl HashCode {
    /// Encode a bit sequence into a code.
    #[must_use]
    pub fn from_bits(bits: &[bool]) -> Self {
        Self {
            hex: HashCodec::encode(bits),
            bits: bits.len() as u32,
        }
    }

    /// Wrap an existing hex string.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the string contains non-hex characters or is
    /// too short to hold `bits` bits.
    pub fn from_hex(hex: &str, bits: u32) -> Result<Self, CodecError> {
        let hex = hex.to_ascii_lowercase();
        if let Some(c) = hex.chars().find(|c| HashCodec::nibble(*c).is_none()) {
            return Err(CodecError::InvalidCharacter(c));
        }
        let capacity = hex.len() as u32 * 4;
        if capacity < bits || capacity >= bits + 4 {
            return Err(CodecError::LengthMismatch {
                hex_len: hex.len(),
                bits,
            });
        }
        Ok(Self { hex, bits })
    }

    /// The hexadecimal representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Number of meaningful bits.
    #[must_use]
    pub fn bit_len(&self) -> u32 {
        self.bits
    }

    /// Decode back into the original bit sequence (padding dropped).
    #[must_use]
    pub fn to_bits(&self) -> Vec<bool> {
        let mut bits = HashCodec::decode(&self.hex).unwrap_or_default();
        bits.truncate(self.bits as usize);
        bits
    }
}

impl fmt::Display for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Outcome of hashing one image with one algorithm and rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum HashValue {
    /// A real hash code.
    Valid(HashCode),
    /// The image was too uniform to hash meaningfully.
    PureColor,
    /// Hashing failed for this image.
    Failed(String),
}

impl HashValue {
    /// The code, if this value holds one.
    #[must_use]
    pub fn code(&self) -> Option<&HashCode> {
        match self {
            Self::Valid(code) => Some(code),
            _ => None,
        }
    }

    /// Whether this is the pure-color marker.
    #[must_use]
    pub fn is_pure_color(&self) -> bool {
        matches!(self, Self::PureColor)
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(code) => write!(f, "{}", code),
            Self::PureColor => write!(f, "pure_color_image"),
            Self::Failed(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// All hash values computed for one image, keyed by algorithm and rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCodes {
    values: BTreeMap<(HashKind, Rotation), HashValue>,
}

impl ImageCodes {
    /// Create an empty set of codes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the value for `kind` at `rotation`, replacing any previous one.
    pub fn insert(&mut self, kind: HashKind, rotation: Rotation, value: HashValue) {
        self.values.insert((kind, rotation), value);
    }

    /// Look up the value for `kind` at `rotation`.
    #[must_use]
    pub fn get(&self, kind: HashKind, rotation: Rotation) -> Option<&HashValue> {
        self.values.get(&(kind, rotation))
    }

    /// Iterate over all rotations stored for `kind`, in ascending angle order.
    pub fn rotations(&self, kind: HashKind) -> impl Iterator<Item = (Rotation, &HashValue)> {
        Rotation::ALL
            .into_iter()
            .filter_map(move |r| self.get(kind, r).map(|v| (r, v)))
    }

    /// Hash kinds with at least one stored value.
    pub fn kinds(&self) -> impl Iterator<Item = HashKind> + '_ {
        HashKind::ALL
            .into_iter()
            .filter(move |k| self.rotations(*k).next().is_some())
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
