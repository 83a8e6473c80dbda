//! Recording record entity

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::{Duration, RecordingFormat};

/// Descriptive tags written into a saved file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

impl RecordingTags {
    /// True when no tag carries a non-blank value
    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }

    /// Non-blank tags as `(key, value)` pairs in converter metadata naming
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("title", self.title.as_deref()),
            ("artist", self.artist.as_deref()),
            ("album", self.album.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }
}

/// One finished capture, pending or saved.
///
/// `format` is the format the user asked for. While a FLAC capture is still
/// waiting for conversion the file on disk is the WAV intermediate; use
/// [`RecordingRecord::container`] for what the bytes actually are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub file_path: PathBuf,
    pub format: RecordingFormat,
    #[serde(default)]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<RecordingTags>,
    pub date_added: DateTime<Local>,
}

impl RecordingRecord {
    /// Create a record stamped with the current time
    pub fn new(file_path: impl Into<PathBuf>, format: RecordingFormat, duration: Duration) -> Self {
        Self {
            file_path: file_path.into(),
            format,
            duration,
            tags: None,
            date_added: Local::now(),
        }
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Format of the bytes currently on disk, from the file extension
    pub fn container(&self) -> Option<RecordingFormat> {
        RecordingFormat::from_path(&self.file_path)
    }

    pub fn exists_on_disk(&self) -> bool {
        self.file_path.is_file()
    }

    pub fn points_at(&self, path: &Path) -> bool {
        self.file_path == path
    }

    pub fn duration_string(&self) -> String {
        self.duration.as_clock()
    }

    pub fn date_added_string(&self) -> String {
        self.date_added.format("%m/%d/%Y %H:%M").to_string()
    }
}
