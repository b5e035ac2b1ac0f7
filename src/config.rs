//! Application configuration.
//!
//! Handles loading and validating `imgpipe.toml`. Stock defaults are
//! overridden by whatever the file sets; CLI flags override both.
//!
//! ## Config File Location
//!
//! Passed with `--config <path>`. Without the flag, `imgpipe.toml` in the
//! current directory is used if it exists; otherwise stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! quality = 80              # Encoder quality (0-100)
//! # format = "webp"         # Target format (omit to keep the source format)
//! overwrite = false         # Replace existing outputs instead of suffixing _1, _2…
//! # dir = "out"             # Write outputs here instead of beside the input
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [preview]
//! thumbnail_size = 400      # Bounding box for load_image thumbnails
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [output]
//! quality = 92
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::format::Format;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "imgpipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `imgpipe.toml`.
///
/// All fields have defaults; files need only specify overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Encoding and output placement.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Thumbnail settings for `load_image`.
    pub preview: PreviewConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 0-100".into(),
            ));
        }
        if self.preview.thumbnail_size == 0 {
            return Err(ConfigError::Validation(
                "preview.thumbnail_size must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be non-zero".into(),
            ));
        }
        if let Some(format) = self.output.format.filter(|f| !f.can_encode()) {
            return Err(ConfigError::Validation(format!(
                "output.format {} can only be decoded",
                format.extension()
            )));
        }
        Ok(())
    }
}

/// Encoding and output placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Encoder quality (0-100).
    pub quality: u32,
    /// Target format; `None` keeps each input's own format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    /// Replace existing files instead of choosing a unique name.
    pub overwrite: bool,
    /// Output directory; `None` writes beside the input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            format: None,
            overwrite: false,
            dir: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers. `None` means one per core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Thumbnail settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// Thumbnails fit within a `thumbnail_size` square.
    pub thumbnail_size: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: 400,
        }
    }
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

// =============================================================================
// Config loading and validation
// =============================================================================

/// Parse and validate config from a TOML string.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from an explicit file. A missing file is an error.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load `explicit` if given, else `imgpipe.toml` in `dir` if present,
/// else stock defaults.
pub fn resolve_config(explicit: Option<&Path>, dir: &Path) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit {
        log::debug!("loading config from {}", path.display());
        return load_config(path);
    }
    let candidate = dir.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        log::debug!("loading config from {}", candidate.display());
        return load_config(&candidate);
    }
    Ok(AppConfig::default())
}

/// Returns a fully-commented stock `imgpipe.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpipe configuration
# =====================
# All keys are optional. Anything left out keeps the value shown here.
# Command-line flags take precedence over this file.

[output]
# Encoder quality, 0-100. JPEG and AVIF use it directly, PNG maps it to a
# compression level, WebP quantises colours below 100, QOI ignores it.
quality = 80

# Target format: "jpeg", "png", "webp", "avif" or "qoi".
# Leave unset to keep each input's own format. JXL can be read, not written.
# format = "webp"

# When false, an existing output gets a numbered sibling (photo_1.webp).
overwrite = false

# Write outputs into this directory instead of next to each input.
# dir = "out"

[processing]
# Maximum parallel workers. Omit to use every CPU core.
# Values above the core count are capped.
# max_processes = 4

[preview]
# Thumbnails returned by load_image fit within this square, in pixels.
thumbnail_size = 400
"##
}
