//! External converter port

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Transcoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    #[error("Converter not found: {0}")]
    ToolMissing(String),

    #[error("Converter failed: {diagnostic}")]
    Failed {
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("Converter I/O error: {0}")]
    Io(String),
}

/// One conversion job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Audio codec for the output (`copy` keeps the stream as is)
    pub codec: String,
    pub bitrate_kbps: Option<u32>,
    /// Container tags written into the output
    pub metadata: Vec<(String, String)>,
}

impl TranscodeRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, codec: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            codec: codec.into(),
            bitrate_kbps: None,
            metadata: Vec::new(),
        }
    }

    pub fn with_bitrate(mut self, kbps: Option<u32>) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Port for an external transcoding process
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one conversion to completion.
    ///
    /// Success means the tool exited with status 0; callers check that the
    /// output exists.
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError>;
}
