//! Recording history persistence port

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::recording::RecordingRecord;

/// Record store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("History file is corrupt: {0}")]
    Corrupt(String),

    #[error("Failed to read history: {0}")]
    ReadFailed(String),

    #[error("Failed to write history: {0}")]
    WriteFailed(String),
}

/// Port for the saved-recordings list
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load every stored record. A missing store yields an empty list.
    async fn load(&self) -> Result<Vec<RecordingRecord>, StoreError>;

    /// Replace the stored list
    async fn save(&self, records: &[RecordingRecord]) -> Result<(), StoreError>;

    /// Location of the store
    fn path(&self) -> PathBuf;
}
