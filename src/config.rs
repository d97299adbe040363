// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! The configuration is a versioned JSON document stored under the user's
//! configuration directory. Limits are read once at startup and never relaxed
//! while a session is running.

use crate::backends::camera::Facing;
use crate::constants::{capture, limits, resize};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current configuration schema version
pub const CONFIG_VERSION: u32 = 1;

/// Directory name under the platform config dir
const APP_DIR: &str = "field-capture";

/// File name of the configuration document
const CONFIG_FILE: &str = "config.json";

/// Limits enforced on every add operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConstraints {
    /// Maximum number of pending entries
    pub max_file_count: usize,
    /// Maximum combined size of pending entries
    pub max_total_bytes: u64,
    /// Maximum size of any one file
    pub max_single_file_bytes: u64,
    /// Accepted MIME patterns (`image/png`, `video/*`, `*/*`)
    pub accepted_types: Vec<String>,
}

impl Default for BatchConstraints {
    fn default() -> Self {
        Self {
            max_file_count: limits::MAX_FILE_COUNT,
            max_total_bytes: limits::MAX_TOTAL_BYTES,
            max_single_file_bytes: limits::MAX_SINGLE_FILE_BYTES,
            accepted_types: limits::ACCEPTED_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl BatchConstraints {
    /// Check a declared content type against the accepted patterns
    ///
    /// Matching is case-insensitive and ignores parameters such as
    /// `; codecs=avc1`.
    pub fn accepts(&self, content_type: &str) -> bool {
        let essence = mime_essence(content_type);
        if essence.is_empty() {
            return false;
        }
        self.accepted_types
            .iter()
            .any(|pattern| mime_matches(&pattern.to_ascii_lowercase(), &essence))
    }
}

/// Lowercased `type/subtype` part of a content type
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn mime_matches(pattern: &str, essence: &str) -> bool {
    if pattern == "*/*" || pattern == essence {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(top) => essence
            .split_once('/')
            .is_some_and(|(ty, sub)| ty == top && !sub.is_empty()),
        None => false,
    }
}

/// Client-side resize settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeSettings {
    /// Files larger than this are candidates for resizing
    pub threshold_bytes: u64,
    /// Types the resizer handles
    pub resizable_types: Vec<String>,
    /// Linear dimension divisor
    pub scale_divisor: u32,
    /// JPEG quality for the re-encoded output
    pub jpeg_quality: u8,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            threshold_bytes: resize::THRESHOLD_BYTES,
            resizable_types: resize::RESIZABLE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            scale_divisor: resize::SCALE_DIVISOR,
            jpeg_quality: resize::JPEG_QUALITY,
        }
    }
}

impl ResizeSettings {
    /// Whether a file of this type and size should be resized
    pub fn should_resize(&self, content_type: &str, size: u64) -> bool {
        let essence = mime_essence(content_type);
        size > self.threshold_bytes && self.resizable_types.iter().any(|t| *t == essence)
    }
}

/// Requested resolution range for one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRange {
    pub min: u32,
    pub ideal: u32,
    pub max: u32,
}

impl ResolutionRange {
    /// Clamp a value into the range
    pub fn clamp(&self, value: u32) -> u32 {
        value.clamp(self.min, self.max)
    }

    /// Whether a value lies inside the range
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Camera session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Facing selected each time a session opens
    pub default_facing: Facing,
    /// Requested width range
    pub width: ResolutionRange,
    /// Requested height range
    pub height: ResolutionRange,
    /// JPEG quality for still captures
    pub still_jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            default_facing: Facing::Environment,
            width: ResolutionRange {
                min: capture::MIN_WIDTH,
                ideal: capture::IDEAL_WIDTH,
                max: capture::MAX_WIDTH,
            },
            height: ResolutionRange {
                min: capture::MIN_HEIGHT,
                ideal: capture::IDEAL_HEIGHT,
                max: capture::MAX_HEIGHT,
            },
            still_jpeg_quality: capture::STILL_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version; mismatching files are replaced by defaults
    pub version: u32,
    /// Admission limits
    pub constraints: BatchConstraints,
    /// Resize behavior
    pub resize: ResizeSettings,
    /// Camera session behavior
    pub capture: CaptureSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            constraints: BatchConstraints::default(),
            resize: ResizeSettings::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from a specific file
    ///
    /// A missing file or an older schema version yields the defaults. A file
    /// that parses but holds invalid limits is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Read(e.to_string())),
        };

        let config: Config =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config.version != CONFIG_VERSION {
            warn!(
                found = config.version,
                expected = CONFIG_VERSION,
                "Config version mismatch, using defaults"
            );
            return Ok(Self::default());
        }

        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }
        let text =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| ConfigError::Write(e.to_string()))?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Reject limits that would make admission meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.constraints;
        if c.max_file_count == 0 {
            return Err(ConfigError::Invalid("max_file_count must be positive".into()));
        }
        if c.max_total_bytes == 0 || c.max_single_file_bytes == 0 {
            return Err(ConfigError::Invalid("byte limits must be positive".into()));
        }
        if c.max_single_file_bytes > c.max_total_bytes {
            return Err(ConfigError::Invalid(
                "max_single_file_bytes exceeds max_total_bytes".into(),
            ));
        }
        if c.accepted_types.is_empty() {
            return Err(ConfigError::Invalid("accepted_types is empty".into()));
        }
        if self.resize.scale_divisor < 2 {
            return Err(ConfigError::Invalid("scale_divisor must be at least 2".into()));
        }
        for quality in [self.resize.jpeg_quality, self.capture.still_jpeg_quality] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::Invalid(format!(
                    "jpeg quality {quality} outside 1..=100"
                )));
            }
        }
        for range in [self.capture.width, self.capture.height] {
            if range.min > range.max || !range.contains(range.ideal) {
                return Err(ConfigError::Invalid(format!(
                    "resolution range {}..{} (ideal {}) is inconsistent",
                    range.min, range.max, range.ideal
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_patterns() {
        let mut constraints = BatchConstraints::default();
        assert!(constraints.accepts("image/png"));
        assert!(constraints.accepts("Video/MP4; codecs=avc1"));
        assert!(!constraints.accepts("image/gif"));
        assert!(!constraints.accepts(""));

        constraints.accepted_types = vec!["image/*".into()];
        assert!(constraints.accepts("image/gif"));
        assert!(!constraints.accepts("video/mp4"));
        assert!(!constraints.accepts("image/"));
    }

    #[test]
    fn test_should_resize() {
        let settings = ResizeSettings::default();
        let big = settings.threshold_bytes + 1;
        assert!(settings.should_resize("image/jpeg", big));
        assert!(!settings.should_resize("image/jpeg", settings.threshold_bytes));
        assert!(!settings.should_resize("video/mp4", big));
        assert!(!settings.should_resize("application/pdf", big));
    }

    #[test]
    fn test_validate_rejects_inverted_caps() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.constraints.max_single_file_bytes = config.constraints.max_total_bytes + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
