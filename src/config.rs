//! Gate configuration.
//!
//! Loaded from TOML, by default from `<config dir>/stream-gate/config.toml`.
//! The threshold accepts loosely typed input: strings and floats are coerced
//! and anything that is not a non-negative number becomes 0.

use crate::error::{GateError, Result};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Default read size for the stream driver
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Configuration for a validation gate and its stream driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Leading bytes required before the predicate runs
    #[serde(deserialize_with = "deserialize_threshold")]
    pub required_bytes: usize,

    /// Size of each upstream read
    pub read_chunk_size: usize,

    /// Keep consuming upstream after the gate disposed
    pub drain_after_dispose: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            required_bytes: 0,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            drain_after_dispose: true,
        }
    }
}

impl GateConfig {
    pub fn new(required_bytes: usize) -> Self {
        Self {
            required_bytes,
            ..Self::default()
        }
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    pub fn with_drain_after_dispose(mut self, drain: bool) -> Self {
        self.drain_after_dispose = drain;
        self
    }

    /// `<config dir>/stream-gate/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stream-gate").join("config.toml"))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| GateError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GateConfig = toml::from_str(&text).map_err(|source| GateError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "loaded gate config");
        Ok(config)
    }

    /// Load from the default path, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(GateError::InvalidConfig(
                "read_chunk_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a threshold the lenient way: optional whitespace and sign, then the
/// leading decimal digits. Negative, empty or non-numeric input yields 0.
pub fn coerce_threshold(raw: &str) -> usize {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];

    if negative || digits.is_empty() {
        return 0;
    }

    // All digits: only overflow can fail, saturate instead
    digits.parse::<usize>().unwrap_or(usize::MAX)
}

/// Coerce a signed count, clamping negatives to 0
pub fn coerce_signed_threshold(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawThreshold {
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

fn deserialize_threshold<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let coerced = match RawThreshold::deserialize(deserializer)? {
        RawThreshold::Int(n) => coerce_signed_threshold(n),
        RawThreshold::Float(f) if f.is_finite() && f >= 1.0 => f.trunc() as usize,
        RawThreshold::Float(_) => 0,
        RawThreshold::Text(s) => coerce_threshold(&s),
        RawThreshold::Other(_) => 0,
    };
    Ok(coerced)
}
