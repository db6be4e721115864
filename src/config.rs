//! Layered application configuration.
//!
//! Values are merged with `figment` in increasing priority:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file: `--config <FILE>` or the platform config directory
//!    (e.g. `~/.config/pixeldupe/config.toml` on Linux)
//! 3. Environment variables prefixed `PIXELDUPE_` (e.g. `PIXELDUPE_HASH_SIZE=16`)
//! 4. Command-line flags, applied by the CLI layer
//!
//! # Example
//!
//! ```toml
//! dhash_threshold = 4
//! kinds = ["dhash", "phash"]
//! detect_rotation = true
//! threads = 8
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duplicates::{AnalysisParams, ParamsError};
use crate::hashing::HashKind;
use crate::scanner::ScanConfig;

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "PIXELDUPE_";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or has wrongly typed values.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// The merged values do not form usable analysis parameters.
    #[error(transparent)]
    Invalid(#[from] ParamsError),

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Writing the config file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path of the config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum dHash distance for a match.
    pub dhash_threshold: u32,
    /// Maximum pHash distance for a match.
    pub phash_threshold: u32,
    /// Maximum aHash distance for a match.
    pub ahash_threshold: u32,
    /// Hash size (N).
    pub hash_size: u32,
    /// Enabled hash kinds.
    pub kinds: Vec<HashKind>,
    /// Detect and exclude pure-color images.
    pub detect_pure_color: bool,
    /// Per-channel standard deviation below which an image is pure color.
    pub pure_color_threshold: f64,
    /// Compare rotated variants.
    pub detect_rotation: bool,
    /// Compare rescaled copies under widened thresholds.
    pub multi_scale: bool,
    /// Match byte-identical files.
    pub detect_exact: bool,
    /// Number of hash kinds that must agree for a pair to match.
    pub min_matching_kinds: usize,
    /// Walk directories recursively.
    pub recursive: bool,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Worker threads for hashing (0 = all cores).
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        let params = AnalysisParams::default();
        let scan = ScanConfig::default();
        Self {
            dhash_threshold: params.dhash_threshold,
            phash_threshold: params.phash_threshold,
            ahash_threshold: params.ahash_threshold,
            hash_size: params.hash_size,
            kinds: params.kinds,
            detect_pure_color: params.detect_pure_color,
            pure_color_threshold: params.pure_color_threshold,
            detect_rotation: params.detect_rotation,
            multi_scale: params.multi_scale,
            detect_exact: params.detect_exact,
            min_matching_kinds: params.min_matching_kinds,
            recursive: params.recursive_scan,
            follow_symlinks: scan.follow_symlinks,
            skip_hidden: scan.skip_hidden,
            threads: 0,
        }
    }
}

impl Config {
    /// Load the merged configuration.
    ///
    /// With `config_path` the file must exist. Without it the default
    /// platform path is used when present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the explicit file is missing or any source
    /// fails to parse.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }
        let config: Self = Self::figment(config_path)
            .extract()
            .map_err(Box::new)?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// The layered provider stack without CLI overrides.
    #[must_use]
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = config_path
            .map(Path::to_path_buf)
            .or_else(Self::default_path);
        if let Some(file) = file {
            log::debug!("Reading config file {}", file.display());
            figment = figment.merge(Toml::file(file));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Default platform-specific config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "pixeldupe", "pixeldupe")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Build the analysis parameters described by this configuration.
    #[must_use]
    pub fn to_params(&self) -> AnalysisParams {
        AnalysisParams::default()
            .with_threshold(HashKind::Dhash, self.dhash_threshold)
            .with_threshold(HashKind::Phash, self.phash_threshold)
            .with_threshold(HashKind::Ahash, self.ahash_threshold)
            .with_hash_size(self.hash_size)
            .with_kinds(self.kinds.clone())
            .with_pure_color(self.detect_pure_color)
            .with_pure_color_threshold(self.pure_color_threshold)
            .with_rotation(self.detect_rotation)
            .with_multi_scale(self.multi_scale)
            .with_exact(self.detect_exact)
            .with_min_matching_kinds(self.min_matching_kinds)
            .with_recursive(self.recursive)
    }

    /// Walk options described by this configuration.
    #[must_use]
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::default()
            .with_recursive(self.recursive)
            .with_follow_symlinks(self.follow_symlinks)
            .with_skip_hidden(self.skip_hidden)
    }

    /// Check the configuration before any work starts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` with the parameter problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_params().validate()?;
        Ok(())
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Serialize` if rendering fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if rendering or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml()?).map_err(io_err)?;
        log::info!("Saved configuration to {}", path.display());
        Ok(())
    }
}
