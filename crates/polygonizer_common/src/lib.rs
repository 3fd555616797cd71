//! # Polygonizer Common - Shared Settings and Utilities
//!
//! Per-image settings shared by the polygonizer core, its worker jobs and the
//! command line front-end.
//!
//! ## Example
//!
//! ```rust
//! use polygonizer_common::{ImageSetting, ImageSettingKey};
//!
//! let mut setting = ImageSetting::default();
//! setting.set(ImageSettingKey::MaxPointCount, 48.0).unwrap();
//! assert_eq!(setting.max_point_count, 48);
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr, VariantNames};
use thiserror::Error;

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, SettingError>;

/// Standard error type for settings operations
#[derive(Error, Debug)]
pub enum SettingError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: ImageSettingKey, message: String },

    #[error("Unknown setting key: {0}")]
    UnknownKey(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Smallest polygon the simplifier will ever produce.
pub const MIN_POINT_COUNT: u32 = 3;

/// Border of transparent pixels placed around every image before tracing.
pub const DEFAULT_PADDING: u32 = 2;

/// Names of the tunable per-image values, in display order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    EnumIter,
    VariantNames,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ImageSettingKey {
    MaxPointCount,
    AlphaThreshold,
    MinimalDistance,
}

impl ImageSettingKey {
    /// Parse a key name, reporting the unrecognised name on failure
    pub fn parse(name: &str) -> Result<Self> {
        name.parse::<Self>()
            .map_err(|_: strum::ParseError| SettingError::UnknownKey(name.to_string()))
    }

    /// Inclusive range accepted by [`ImageSetting::set`]
    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::MaxPointCount => (MIN_POINT_COUNT as f64, u16::MAX as f64),
            Self::AlphaThreshold => (0.0, 255.0),
            Self::MinimalDistance => (0.0, f64::MAX),
        }
    }
}

/// Per-image polygonization settings.
///
/// Immutable once a job has been dispatched; the UI edits a copy and
/// re-submits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageSetting {
    /// Upper bound on vertices per output polygon
    #[schemars(range(min = 3))]
    pub max_point_count: u32,
    /// Pixels with alpha at or above this value are opaque
    pub alpha_threshold: u8,
    /// Simplification tolerance in pixels
    #[schemars(range(min = 0.0))]
    pub minimal_distance: f64,
}

impl Default for ImageSetting {
    fn default() -> Self {
        Self {
            max_point_count: 32,
            alpha_threshold: 0,
            minimal_distance: 8.0,
        }
    }
}

impl ImageSetting {
    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<()> {
        for key in ImageSettingKey::iter() {
            check_range(key, self.get(key))?;
        }
        Ok(())
    }

    /// Read a setting as a plain number
    pub fn get(&self, key: ImageSettingKey) -> f64 {
        match key {
            ImageSettingKey::MaxPointCount => self.max_point_count as f64,
            ImageSettingKey::AlphaThreshold => self.alpha_threshold as f64,
            ImageSettingKey::MinimalDistance => self.minimal_distance,
        }
    }

    /// Update one setting from a plain number, rejecting out-of-range values
    pub fn set(&mut self, key: ImageSettingKey, value: f64) -> Result<()> {
        check_range(key, value)?;
        match key {
            ImageSettingKey::MaxPointCount => self.max_point_count = value.round() as u32,
            ImageSettingKey::AlphaThreshold => self.alpha_threshold = value.round() as u8,
            ImageSettingKey::MinimalDistance => self.minimal_distance = value,
        }
        Ok(())
    }

    /// Parse and validate a setting object; missing fields take defaults
    pub fn from_json(content: &str) -> Result<Self> {
        let setting: ImageSetting = serde_json::from_str(content)?;
        setting.validate()?;
        Ok(setting)
    }

    /// Return a copy with `key` replaced
    pub fn with(mut self, key: ImageSettingKey, value: f64) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }
}

fn check_range(key: ImageSettingKey, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(SettingError::InvalidValue {
            key,
            message: "must be a finite number".to_string(),
        });
    }
    let (min, max) = key.range();
    if value < min || value > max {
        return Err(SettingError::InvalidValue {
            key,
            message: format!("{value} is outside {min}..={max}"),
        });
    }
    Ok(())
}

/// Utility functions for image file handling
pub mod utils {
    use std::path::Path;

    /// Check if a file extension indicates a decodable image
    pub fn is_image_file(path: impl AsRef<Path>) -> bool {
        get_file_extension(path).is_some_and(|ext| {
            matches!(
                ext.as_str(),
                "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tif" | "tiff"
            )
        })
    }

    /// Get the lowercase file extension
    pub fn get_file_extension(path: impl AsRef<Path>) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// File name without its extension, used as a display label
    pub fn file_label(path: impl AsRef<Path>) -> String {
        path.as_ref()
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string()
    }
}
