//! Hamming distance between hash codes.
//!
//! Distances are counted at bit level: corresponding hex digits are XORed and
//! the set bits counted, with zero padding in the final nibble ignored.
//!
//! Sentinel handling:
//! - A pure-color value against anything reports the maximum distance (the
//!   other code's bit length, or the configured bit length of the kind when
//!   both sides are pure-color), so uniform images never cluster together.
//! - A failed value cannot be compared at all.

use thiserror::Error;

use super::{HashCode, HashCodec, HashKind, HashValue};

/// Errors that can occur while comparing two hash values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistanceError {
    /// The codes were produced with different sizes and cannot be compared.
    #[error("Incomparable hash codes: {left} bits vs {right} bits")]
    IncomparableCodes {
        /// Bit length of the left code
        left: u32,
        /// Bit length of the right code
        right: u32,
    },

    /// A code contained a non-hex character.
    #[error("Invalid hex character '{0}' in hash code")]
    InvalidCharacter(char),

    /// One of the values is a hashing failure.
    #[error("Hash value unavailable for comparison")]
    Unavailable,
}

/// Computes distances between hash values of a fixed hash size.
#[derive(Debug, Clone, Copy)]
pub struct DistanceEngine {
    hash_size: u32,
}

impl DistanceEngine {
    /// Create an engine for codes produced with hash size `hash_size`.
    #[must_use]
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }

    /// Largest possible distance for `kind` at the configured hash size.
    #[must_use]
    pub fn max_distance(&self, kind: HashKind) -> u32 {
        kind.bit_len(self.hash_size)
    }

    /// Distance between two values of the same kind.
    ///
    /// # Errors
    ///
    /// - `DistanceError::Unavailable` if either value is a failure
    /// - `DistanceError::IncomparableCodes` if the code lengths differ
    /// - `DistanceError::InvalidCharacter` if a code is not valid hex
    pub fn distance(
        &self,
        kind: HashKind,
        a: &HashValue,
        b: &HashValue,
    ) -> Result<u32, DistanceError> {
        match (a, b) {
            (HashValue::Failed(_), _) | (_, HashValue::Failed(_)) => Err(DistanceError::Unavailable),
            (HashValue::Valid(x), HashValue::Valid(y)) => Self::code_distance(x, y),
            (HashValue::Valid(code), HashValue::PureColor)
            | (HashValue::PureColor, HashValue::Valid(code)) => Ok(code.bit_len()),
            (HashValue::PureColor, HashValue::PureColor) => Ok(self.max_distance(kind)),
        }
    }

    /// Bit-level Hamming distance between two codes.
    ///
    /// # Errors
    ///
    /// Returns `DistanceError::IncomparableCodes` when lengths differ, or
    /// `DistanceError::InvalidCharacter` for non-hex content.
    pub fn code_distance(a: &HashCode, b: &HashCode) -> Result<u32, DistanceError> {
        let (left, right) = (a.as_str(), b.as_str());
        if a.bit_len() != b.bit_len() || left.len() != right.len() {
            return Err(DistanceError::IncomparableCodes {
                left: a.bit_len(),
                right: b.bit_len(),
            });
        }

        let padding = (left.len() as u32 * 4).saturating_sub(a.bit_len());
        let last = left.len().saturating_sub(1);

        left.chars()
            .zip(right.chars())
            .enumerate()
            .try_fold(0u32, |acc, (i, (l, r))| {
                let x = nibble(l)?;
                let y = nibble(r)?;
                let mut diff = x ^ y;
                if i == last {
                    diff &= 0x0f_u8.wrapping_shl(padding) & 0x0f;
                }
                Ok(acc + diff.count_ones())
            })
    }
}

fn nibble(c: char) -> Result<u8, DistanceError> {
    HashCodec::nibble(c).ok_or(DistanceError::InvalidCharacter(c))
}

impl Default for DistanceEngine {
    fn default() -> Self {
        Self::new(super::perceptual::DEFAULT_HASH_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(hex: &str, bits: u32) -> HashValue {
        HashValue::Valid(HashCode::from_hex(hex, bits).unwrap())
    }

    #[test]
    fn test_identical_codes() {
        let engine = DistanceEngine::default();
        let a = code("ffffffffffffffff", 64);
        assert_eq!(engine.distance(HashKind::Dhash, &a, &a).unwrap(), 0);
    }

    #[test]
    fn test_bit_level_counting() {
        let engine = DistanceEngine::default();
        // 0 vs f differs in four bits, 1 vs 2 in two bits
        let a = code("0000000000000001", 64);
        let b = code("f000000000000002", 64);
        assert_eq!(engine.distance(HashKind::Ahash, &a, &b).unwrap(), 6);
    }

    #[test]
    fn test_padding_bits_ignored() {
        // 63-bit codes differ only in the padding bit of the last nibble
        let a = HashCode::from_hex("fffffffffffffffe", 63).unwrap();
        let b = HashCode::from_hex("ffffffffffffffff", 63).unwrap();
        assert_eq!(DistanceEngine::code_distance(&a, &b).unwrap(), 0);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let engine = DistanceEngine::default();
        let a = code("ffff", 16);
        let b = code("ffffffff", 32);
        assert_eq!(
            engine.distance(HashKind::Dhash, &a, &b),
            Err(DistanceError::IncomparableCodes { left: 16, right: 32 })
        );
    }

    #[test]
    fn test_pure_color_is_max_distance() {
        let engine = DistanceEngine::default();
        let a = code("0123456789abcdef", 64);
        assert_eq!(
            engine.distance(HashKind::Ahash, &a, &HashValue::PureColor).unwrap(),
            64
        );
        assert_eq!(
            engine.distance(HashKind::Ahash, &HashValue::PureColor, &a).unwrap(),
            64
        );
        assert_eq!(
            engine
                .distance(HashKind::Phash, &HashValue::PureColor, &HashValue::PureColor)
                .unwrap(),
            63
        );
    }

    #[test]
    fn test_failed_value_unavailable() {
        let engine = DistanceEngine::default();
        let a = code("00", 8);
        let failed = HashValue::Failed("decode error".to_string());
        assert_eq!(
            engine.distance(HashKind::Dhash, &a, &failed),
            Err(DistanceError::Unavailable)
        );
    }

    #[test]
    fn test_invalid_character_reported() {
        let bad: HashCode = serde_json::from_str(r#"{"hex":"00zz","bits":16}"#).unwrap();
        let good = HashCode::from_hex("0000", 16).unwrap();
        assert_eq!(
            DistanceEngine::code_distance(&good, &bad),
            Err(DistanceError::InvalidCharacter('z'))
        );

        // Digits are read the same way the codec reads them
        let upper: HashCode = serde_json::from_str(r#"{"hex":"F0","bits":8}"#).unwrap();
        let lower = HashCode::from_hex("f0", 8).unwrap();
        assert_eq!(DistanceEngine::code_distance(&upper, &lower), Ok(0));
    }

    #[test]
    fn test_symmetry() {
        let engine = DistanceEngine::default();
        let a = code("0f0f0f0f0f0f0f0f", 64);
        let b = code("00ff00ff00ff00ff", 64);
        assert_eq!(
            engine.distance(HashKind::Dhash, &a, &b).unwrap(),
            engine.distance(HashKind::Dhash, &b, &a).unwrap()
        );
    }
}
