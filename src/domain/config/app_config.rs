//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::RecordingFormat;

/// Converter executable looked up on PATH when none is configured
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Log filter used when neither ISOCAP_LOG nor `log_level` is set
pub const DEFAULT_LOG_LEVEL: &str = "warn";

const APP_DIR: &str = "isocap";
const HISTORY_FILE_NAME: &str = "recording_history.json";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub format: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub temp_dir: Option<String>,
    pub history_file: Option<String>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Create config with default values.
    ///
    /// Path defaults stay unset so they resolve per machine at runtime.
    pub fn defaults() -> Self {
        Self {
            format: Some("mp3".to_string()),
            ffmpeg_path: Some(DEFAULT_FFMPEG.to_string()),
            temp_dir: None,
            history_file: None,
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            format: other.format.or(self.format),
            ffmpeg_path: other.ffmpeg_path.or(self.ffmpeg_path),
            temp_dir: other.temp_dir.or(self.temp_dir),
            history_file: other.history_file.or(self.history_file),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Get format as parsed RecordingFormat, or MP3 if not set/invalid
    pub fn format_or_default(&self) -> RecordingFormat {
        self.format
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn ffmpeg_path_or_default(&self) -> &str {
        self.ffmpeg_path
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_FFMPEG)
    }

    /// Directory for in-progress captures, or the OS temp dir
    pub fn temp_dir_or_default(&self) -> PathBuf {
        self.temp_dir
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// History file, or `<local data dir>/isocap/recording_history.json`
    pub fn history_file_or_default(&self) -> PathBuf {
        self.history_file
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_history_file)
    }

    pub fn log_level_or_default(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

fn default_history_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(HISTORY_FILE_NAME)
}
