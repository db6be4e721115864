//! Bit to hexadecimal packing shared by all hash kinds.
//!
//! Bits are packed four at a time into nibbles, most significant bit first
//! within each nibble. A trailing partial nibble is zero-padded on the right,
//! so `[true]` encodes as `"8"`.

use thiserror::Error;

/// Errors that can occur while decoding a hash code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A character outside `[0-9a-f]` was found.
    #[error("Invalid hex character '{0}' in hash code")]
    InvalidCharacter(char),

    /// The hex string cannot hold exactly the declared number of bits.
    #[error("Hash code of {hex_len} hex digits cannot carry {bits} bits")]
    LengthMismatch {
        /// Number of hex digits supplied
        hex_len: usize,
        /// Declared bit count
        bits: u32,
    },
}

/// Stateless encoder/decoder between bit sequences and hex strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCodec;

impl HashCodec {
    /// Pack a bit sequence into lowercase hex.
    ///
    /// # Example
    ///
    /// ```
    /// use pixeldupe::hashing::HashCodec;
    ///
    /// assert_eq!(HashCodec::encode(&[true, false, true, true]), "b");
    /// assert_eq!(HashCodec::encode(&[true, true, true, true, true]), "f8");
    /// ```
    #[must_use]
    pub fn encode(bits: &[bool]) -> String {
        bits.chunks(4)
            .map(|chunk| {
                let value = chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << (3 - i)));
                char::from_digit(u32::from(value), 16).unwrap_or('0')
            })
            .collect()
    }

    /// Unpack a hex string into bits (four per character, padding included).
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidCharacter` for anything outside `[0-9a-fA-F]`.
    pub fn decode(hex: &str) -> Result<Vec<bool>, CodecError> {
        let mut bits = Vec::with_capacity(hex.len() * 4);
        for c in hex.chars() {
            let value = Self::nibble(c).ok_or(CodecError::InvalidCharacter(c))?;
            bits.extend((0..4).map(|i| value & (1 << (3 - i)) != 0));
        }
        Ok(bits)
    }

    /// Value of a single hex digit.
    #[must_use]
    pub fn nibble(c: char) -> Option<u8> {
        c.to_digit(16).map(|v| v as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty() {
        assert_eq!(HashCodec::encode(&[]), "");
    }

    #[test]
    fn test_encode_msb_first() {
        assert_eq!(HashCodec::encode(&[true, false, false, false]), "8");
        assert_eq!(HashCodec::encode(&[false, false, false, true]), "1");
        assert_eq!(HashCodec::encode(&[true; 8]), "ff");
    }

    #[test]
    fn test_encode_pads_partial_nibble() {
        // 7 bits: 1010 101 -> "a" + "1010" -> "aa"
        let bits = [true, false, true, false, true, false, true];
        assert_eq!(HashCodec::encode(&bits), "aa");
        assert_eq!(HashCodec::encode(&[true]), "8");
    }

    #[test]
    fn test_encode_length() {
        assert_eq!(HashCodec::encode(&vec![false; 64]).len(), 16);
        assert_eq!(HashCodec::encode(&vec![false; 63]).len(), 16);
        assert_eq!(HashCodec::encode(&vec![false; 255]).len(), 64);
    }

    #[test]
    fn test_decode_inverse() {
        let bits = vec![true, true, false, true, false, false, true, false];
        let hex = HashCodec::encode(&bits);
        assert_eq!(HashCodec::decode(&hex).unwrap(), bits);
    }

    #[test]
    fn test_decode_accepts_uppercase() {
        assert_eq!(HashCodec::decode("F").unwrap(), vec![true; 4]);
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        assert_eq!(
            HashCodec::decode("0z"),
            Err(CodecError::InvalidCharacter('z'))
        );
    }
}
