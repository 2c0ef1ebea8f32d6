// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `<config dir>/frame-annotator/config.json`. A missing
//! file means defaults; a malformed one is reported and replaced by defaults
//! in memory (the file itself is left alone until the next save).
//!
//! | Variable | Effect |
//! |---|---|
//! | `FRAME_ANNOTATOR_DATA_DIR` | overrides [`Config::data_dir`] |

use crate::constants::{app_info, timing};
use crate::errors::StorageError;
use crate::media::SeekPolicy;
use crate::pipelines::{EncodingFormat, EncodingQuality, ImageEncoder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Config file name inside the application config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the category store lives; `None` uses the platform data dir
    pub data_dir: Option<PathBuf>,
    /// Upper bound for one capture decode, in seconds
    pub decode_timeout_secs: u64,
    /// Upper bound for probing a new video, in seconds
    pub probe_timeout_secs: u64,
    /// Frame chosen when a timestamp falls between two frames
    pub seek_policy: SeekPolicy,
    /// Image format for exports
    pub export_format: EncodingFormat,
    /// JPEG quality preset for exports
    pub export_quality: EncodingQuality,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            decode_timeout_secs: timing::DEFAULT_DECODE_TIMEOUT.as_secs(),
            probe_timeout_secs: timing::DEFAULT_PROBE_TIMEOUT.as_secs(),
            seek_policy: SeekPolicy::default(),
            export_format: EncodingFormat::default(),
            export_quality: EncodingQuality::default(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(app_info::APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory on this platform, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`; missing or malformed files yield defaults
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config unreadable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config malformed, using defaults");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.display().to_string(),
                message: e.to_string(),
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Effective data directory
    ///
    /// `FRAME_ANNOTATOR_DATA_DIR` wins over the configured value, which wins
    /// over the platform data directory (or `.` if there is none).
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir_with_env(std::env::var_os(app_info::DATA_DIR_ENV).map(PathBuf::from))
    }

    fn data_dir_with_env(&self, env: Option<PathBuf>) -> PathBuf {
        env.filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.data_dir.clone())
            .or_else(|| dirs::data_dir().map(|d| d.join(app_info::APP_NAME)))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn encoder(&self) -> ImageEncoder {
        ImageEncoder::new(self.export_format, self.export_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_wins() {
        let config = Config {
            data_dir: Some(PathBuf::from("/configured")),
            ..Config::default()
        };
        assert_eq!(
            config.data_dir_with_env(Some(PathBuf::from("/from-env"))),
            PathBuf::from("/from-env")
        );
        assert_eq!(
            config.data_dir_with_env(Some(PathBuf::new())),
            PathBuf::from("/configured")
        );
        assert_eq!(config.data_dir_with_env(None), PathBuf::from("/configured"));
    }

    #[test]
    fn test_zero_timeouts_are_raised() {
        let config = Config {
            decode_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.decode_timeout(), Duration::from_secs(1));
    }
}
