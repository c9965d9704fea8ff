//! Pipeline configuration.
//!
//! A single optional `shotbook.toml` overrides stock defaults. Config files
//! are sparse — specify only the values you want to change. Unknown keys are
//! rejected to catch typos early.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! raw_root = "images"                      # source-of-truth tree, scanned recursively
//! derived_root = "images_optimized"        # flat directory of derived artifacts
//! record_file = "optimization-record.json"
//! state_file = "run-state.json"
//! catalog_file = "catalog.json"
//!
//! [optimizer]
//! max_width = 1920          # fit-within box; smaller sources are never upscaled
//! max_height = 1920
//! quality = 80              # lossy encoding quality (1-100)
//! format = "webp"           # webp | jpeg | png
//! preserve_format = false   # encode to each source's own format instead
//!
//! [cache]
//! verify_content = false    # true: a record hit also requires a SHA-256 match,
//!                           # so sources replaced in-place get re-optimized
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```

use crate::optimize::{OptimizeSettings, OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration loaded from `shotbook.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub optimizer: OptimizerConfig,
    pub cache: CacheConfig,
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Load from `path` if it exists, falling back to stock defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.optimizer.quality == 0 || self.optimizer.quality > 100 {
            return Err(ConfigError::Validation(
                "optimizer.quality must be 1-100".into(),
            ));
        }
        if self.optimizer.max_width == 0 || self.optimizer.max_height == 0 {
            return Err(ConfigError::Validation(
                "optimizer.max_width and max_height must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// On-disk layout of the pipeline's inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Source-of-truth directory tree of raw images.
    pub raw_root: PathBuf,
    /// Flat directory of derived artifacts, `<basename>.<format>`.
    pub derived_root: PathBuf,
    pub record_file: PathBuf,
    pub state_file: PathBuf,
    pub catalog_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_root: PathBuf::from("images"),
            derived_root: PathBuf::from("images_optimized"),
            record_file: PathBuf::from("optimization-record.json"),
            state_file: PathBuf::from("run-state.json"),
            catalog_file: PathBuf::from("catalog.json"),
        }
    }
}

/// Optimizer settings as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
    pub format: OutputFormat,
    /// Encode to each source's own format instead of `format`.
    pub preserve_format: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            quality: 80,
            format: OutputFormat::Webp,
            preserve_format: false,
        }
    }
}

impl OptimizerConfig {
    pub fn to_settings(&self) -> OptimizeSettings {
        OptimizeSettings {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: Quality::new(self.quality),
            format: self.format,
            preserve_format: self.preserve_format,
        }
    }
}

/// Cache-validity policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// When true, a record hit also requires the stored SHA-256 of the
    /// source to match, so an image replaced in-place under the same name
    /// gets re-optimized. Off by default: screenshot capture is write-once
    /// and presence-only skipping avoids reading unchanged sources at all.
    pub verify_content: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// A fully documented stock config, printed by `shotbook gen-config`.
pub fn stock_config_toml() -> &'static str {
    r#"# shotbook configuration
# All options are optional - defaults shown below.

[paths]
# Source-of-truth directory tree of raw images, scanned recursively.
raw_root = "images"
# Flat directory of derived artifacts, named <basename>.<format>.
derived_root = "images_optimized"
# Basename -> optimization metadata map (the processing cache).
record_file = "optimization-record.json"
# Persisted run-state gate.
state_file = "run-state.json"
# Materialized catalog consumed by the gallery UI.
catalog_file = "catalog.json"

[optimizer]
# Fit-within box for derived images. Smaller sources are never upscaled.
max_width = 1920
max_height = 1920
# Lossy encoding quality (1-100).
quality = 80
# Target format: "webp", "jpeg", or "png".
format = "webp"
# Encode each image to its source's own format instead of the target above.
preserve_format = false

[cache]
# When true, a record hit also requires the stored SHA-256 of the source to
# match, so an image replaced in-place under the same name is re-optimized.
# The default trusts key presence alone and never re-reads unchanged sources.
verify_content = false

[processing]
# Max parallel workers (omit for auto = CPU cores).
# max_processes = 4
"#
}
