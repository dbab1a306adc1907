//! Pipeline configuration.
//!
//! Loaded from an optional TOML file passed with `--config`. Every key is
//! optional; unknown keys are rejected to catch typos early.
//!
//! ```toml
//! # Rotate/flip pixels according to EXIF orientation before resizing.
//! normalize_orientation = true
//!
//! [limits]
//! max_dimension = 8192           # Largest frame side the scratch buffer accepts
//! output_buffer_bytes = 52428800 # Pre-sized output buffer (50 MiB)
//! grow_output = false            # false: fail when the output does not fit
//! max_frames = 1000              # Most frames decoded from one animation
//!
//! [fetch]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [processing]
//! max_processes = 4              # Worker cap for --runs (omit for CPU cores)
//!
//! [encode.jpeg]
//! jpeg_quality = 85
//! ```
//!
//! ## Encode tables
//!
//! `[encode.<ext>]` replaces the stock settings for that extension as a
//! whole. Extensions that are not mentioned keep their stock settings.

use crate::imaging::encode_options::default_entries;
use crate::imaging::{DEFAULT_MAX_FRAMES, EncodeKey, EncodeOptions, EncodeOptionsTable};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
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

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Apply EXIF orientation before resizing.
    pub normalize_orientation: bool,
    /// Memory ceilings for the transform buffers.
    pub limits: LimitsConfig,
    /// Remote input client settings.
    pub fetch: FetchConfig,
    /// Worker pool settings for repeated runs.
    pub processing: ProcessingConfig,
    /// Per-extension encoder overrides.
    pub encode: BTreeMap<String, EncodeOptions>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize_orientation: true,
            limits: LimitsConfig::default(),
            fetch: FetchConfig::default(),
            processing: ProcessingConfig::default(),
            encode: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "limits.max_dimension must be non-zero".into(),
            ));
        }
        if self.limits.output_buffer_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.output_buffer_bytes must be non-zero".into(),
            ));
        }
        if self.limits.max_frames == 0 {
            return Err(ConfigError::Validation(
                "limits.max_frames must be non-zero".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be non-zero".into(),
            ));
        }
        for (ext, options) in &self.encode {
            for (key, value) in options.iter() {
                let range = valid_range(key);
                if !range.contains(&value) {
                    return Err(ConfigError::Validation(format!(
                        "encode.{ext}: {} must be {}-{}, got {value}",
                        key_name(key),
                        range.start(),
                        range.end()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Stock encoder settings with this config's per-extension replacements.
    pub fn encode_table(&self) -> EncodeOptionsTable {
        let mut entries: BTreeMap<String, EncodeOptions> = default_entries()
            .into_iter()
            .map(|(ext, opts)| (ext.to_string(), opts))
            .collect();
        for (ext, opts) in &self.encode {
            entries.insert(
                crate::imaging::format::normalize_extension(ext),
                opts.clone(),
            );
        }
        EncodeOptionsTable::new(entries)
    }
}

fn valid_range(key: EncodeKey) -> std::ops::RangeInclusive<i32> {
    match key {
        EncodeKey::JpegQuality | EncodeKey::WebpQuality => 1..=100,
        EncodeKey::PngCompression => 0..=9,
        EncodeKey::GifSpeed => 1..=30,
    }
}

fn key_name(key: EncodeKey) -> &'static str {
    match key {
        EncodeKey::JpegQuality => "jpeg_quality",
        EncodeKey::PngCompression => "png_compression",
        EncodeKey::WebpQuality => "webp_quality",
        EncodeKey::GifSpeed => "gif_speed",
    }
}

/// Transform buffer ceilings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest width or height of any intermediate frame.
    pub max_dimension: u32,
    /// Initial (or, with `grow_output = false`, maximum) output size in bytes.
    pub output_buffer_bytes: usize,
    /// Grow the output buffer instead of failing when it is too small.
    pub grow_output: bool,
    /// Most frames an animated source may have when its animation is kept.
    pub max_frames: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
            output_buffer_bytes: 50 * 1024 * 1024,
            grow_output: false,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

/// HTTP client settings for remote inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Whole-request timeout.
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout.
    pub connect_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers for `--runs`.
    /// When absent, defaults to the number of CPU cores.
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
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Load and validate a config file; `None` gives the validated defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `--gen-config` CLI flag.
pub fn stock_config_toml() -> &'static str {
    r##"# imgops configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Rotate/flip decoded pixels according to the EXIF orientation tag before
# resizing. Output dimensions then refer to the upright image.
normalize_orientation = true

# ---------------------------------------------------------------------------
# Memory limits
# ---------------------------------------------------------------------------
[limits]
# Largest width or height of any frame the pipeline will decode or produce.
# Bounds the scratch buffer at max_dimension^2 * 4 bytes.
max_dimension = 8192

# Output buffer size in bytes (50 MiB).
output_buffer_bytes = 52428800

# When false, an encoded image larger than output_buffer_bytes is an error.
# When true, the buffer grows instead.
grow_output = false

# Most frames an animated input may have when it is re-encoded as an
# animation. Frames are decoded one at a time; this bounds the work per run.
max_frames = 1000

# ---------------------------------------------------------------------------
# Remote input
# ---------------------------------------------------------------------------
[fetch]
timeout_secs = 30
connect_timeout_secs = 10

# ---------------------------------------------------------------------------
# Parallel runs (--runs)
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads. Omit to use all CPU cores.
# max_processes = 4

# ---------------------------------------------------------------------------
# Encoder settings, per output extension
# ---------------------------------------------------------------------------
# A table replaces the stock settings for its extension entirely.
# Keys: jpeg_quality (1-100), png_compression (0-9), webp_quality (1-100),
# gif_speed (1-30). Extensions without a table use encoder defaults.
[encode.jpeg]
jpeg_quality = 85

[encode.png]
png_compression = 7

[encode.webp]
webp_quality = 85
"##
}
