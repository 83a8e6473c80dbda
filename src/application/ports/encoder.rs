//! Encoder sink port

use std::path::Path;

use thiserror::Error;

use super::loopback::StreamFormat;
use crate::domain::recording::RecordingFormat;

/// Encoder errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncoderError {
    #[error("Encoder unavailable: {0}")]
    Unavailable(String),

    #[error("Encoder write failed: {0}")]
    WriteFailed(String),

    #[error("Failed to finalize output: {0}")]
    FinalizeFailed(String),
}

/// Destination for captured PCM (interleaved little-endian f32 bytes)
pub trait EncoderSink: Send {
    fn write(&mut self, pcm: &[u8]) -> Result<(), EncoderError>;

    /// Flush and close the container
    fn finalize(self: Box<Self>) -> Result<(), EncoderError>;
}

/// Port for building the sink that matches a requested format
pub trait EncoderFactory: Send + Sync {
    /// Create a sink writing `path`.
    ///
    /// WAV and FLAC requests get a PCM container writer; MP3 gets a lossy
    /// encoder at the fixed capture bitrate.
    fn create(
        &self,
        path: &Path,
        format: RecordingFormat,
        stream: StreamFormat,
    ) -> Result<Box<dyn EncoderSink>, EncoderError>;
}
