//! JSON file record store

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::ports::{RecordStore, StoreError};
use crate::domain::recording::RecordingRecord;

/// History kept as a pretty-printed JSON array.
///
/// Writes go to a sibling temp file that is renamed over the original, so
/// a crash mid-write leaves the previous history intact.
pub struct JsonRecordStore {
    path: PathBuf,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn load(&self) -> Result<Vec<RecordingRecord>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no history file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::ReadFailed(e.to_string())),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn save(&self, records: &[RecordingRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(records)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        let staging = self.staging_path();
        fs::write(&staging, content)
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        debug!(path = %self.path.display(), count = records.len(), "history saved");
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}
