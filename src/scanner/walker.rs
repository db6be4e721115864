//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! The walker discovers image files below a root directory, honouring the
//! recursion toggle, hidden-file skipping and symlink policy. Entries are
//! visited in file-name order so repeated runs produce the same input order
//! and therefore the same group references.
//!
//! Errors on individual entries are yielded as [`ScanError`] values and do not
//! stop the walk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::{is_image_path, ScanConfig, ScanError};

/// Directory walker for image discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: ScanConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pixeldupe::scanner::{ScanConfig, Walker};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), ScanConfig::default());
    /// ```
    #[must_use]
    pub fn new(path: &Path, config: ScanConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Check that the root exists and is a directory.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::NotFound` or `ScanError::NotADirectory`.
    pub fn validate_root(&self) -> Result<(), ScanError> {
        if !self.root.exists() {
            return Err(ScanError::NotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        Ok(())
    }

    /// Walk the directory and yield image paths in sorted order.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        let mut walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();
        if !self.config.recursive {
            walk_dir = walk_dir.max_depth(1);
        }

        let skip_hidden = self.config.skip_hidden;
        walk_dir
            .into_iter()
            .filter_entry(move |entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry)))
            .filter_map(move |entry_result| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return None;
                }

                match entry_result {
                    Ok(entry) => {
                        // With follow_links the file type already reflects the target
                        if !entry.file_type().is_file() {
                            return None;
                        }
                        let path = entry.into_path();
                        if !is_image_path(&path) {
                            log::trace!("Skipping non-image file: {}", path.display());
                            return None;
                        }
                        Some(Ok(path))
                    }
                    Err(e) => {
                        let path = e
                            .path()
                            .map_or_else(|| self.root.clone(), Path::to_path_buf);
                        Some(Err(self.handle_walk_error(path, e)))
                    }
                }
            })
    }

    /// Convert a walkdir error into a [`ScanError`].
    fn handle_walk_error(&self, path: PathBuf, error: walkdir::Error) -> ScanError {
        use std::io::ErrorKind;

        let kind = error.io_error().map(std::io::Error::kind);
        match kind {
            Some(ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(ErrorKind::NotFound) => {
                log::debug!("Entry vanished during walk: {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
