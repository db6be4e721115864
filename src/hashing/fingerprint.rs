//! Content fingerprints for exact duplicate detection.
//!
//! Exact matching runs in two steps:
//!
//! 1. **Fingerprint**: the file size plus a BLAKE3 digest over sampled byte
//!    windows (start, middle, end). Files no larger than the sampled span are
//!    digested in full. Byte-identical files always share a fingerprint, but
//!    files that differ only outside the windows collide, so a fingerprint is
//!    a bucket key and never proof of identity.
//! 2. **Content digest**: a BLAKE3 digest of the whole file, computed only for
//!    files whose fingerprints collide.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default size of each sampled window (4KB).
pub const DEFAULT_WINDOW_SIZE: usize = 4096;

/// Read buffer size for full-content digests (64KB).
const CONTENT_BUFFER_SIZE: usize = 64 * 1024;

/// BLAKE3 digest of a whole file.
pub type ContentDigest = [u8; 32];

/// Errors that can occur while fingerprinting a file.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// I/O error while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path of the file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Size plus sampled digest of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File size in bytes
    pub size: u64,
    /// BLAKE3 digest of the size and sampled windows
    pub digest: [u8; 32],
}

impl Fingerprint {
    /// Lowercase hex of the digest.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.size, &self.to_hex()[..16])
    }
}

/// Computes [`Fingerprint`]s from files or buffers.
#[derive(Debug, Clone, Copy)]
pub struct FileFingerprinter {
    window: usize,
}

impl FileFingerprinter {
    /// Create a fingerprinter with the default 4KB window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Use a different window size (minimum 1 byte).
    #[must_use]
    pub fn with_window_size(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Fingerprint the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `FingerprintError::Io` if the file cannot be opened or read.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, FingerprintError> {
        let io_err = |source| FingerprintError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let size = file.metadata().map_err(io_err)?.len();
        self.fingerprint_reader(&mut file, size).map_err(io_err)
    }

    /// Fingerprint an in-memory buffer.
    ///
    /// Produces the same fingerprint as a file with identical contents.
    #[must_use]
    pub fn fingerprint_bytes(&self, bytes: &[u8]) -> Fingerprint {
        let mut cursor = Cursor::new(bytes);
        // Reads from a slice cursor cannot fail
        self.fingerprint_reader(&mut cursor, bytes.len() as u64)
            .unwrap_or(Fingerprint {
                size: bytes.len() as u64,
                digest: *blake3::hash(bytes).as_bytes(),
            })
    }

    /// Digest the full contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `FingerprintError::Io` if the file cannot be opened or read.
    pub fn content_digest(&self, path: &Path) -> Result<ContentDigest, FingerprintError> {
        let io_err = |source| FingerprintError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; CONTENT_BUFFER_SIZE];
        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_err(e)),
            };
            hasher.update(&buffer[..read]);
        }
        Ok(*hasher.finalize().as_bytes())
    }

    fn fingerprint_reader<R: Read + Seek>(&self, reader: &mut R, size: u64) -> io::Result<Fingerprint> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&size.to_le_bytes());

        let window = self.window as u64;
        if size <= window * 3 {
            let mut contents = Vec::with_capacity(size as usize);
            reader.read_to_end(&mut contents)?;
            hasher.update(&contents);
        } else {
            let mut buffer = vec![0u8; self.window];
            for offset in [0, size / 2 - window / 2, size - window] {
                reader.seek(SeekFrom::Start(offset))?;
                reader.read_exact(&mut buffer)?;
                hasher.update(&buffer);
            }
        }

        Ok(Fingerprint {
            size,
            digest: *hasher.finalize().as_bytes(),
        })
    }
}

impl Default for FileFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}
