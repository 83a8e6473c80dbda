//! Background conversion of capture intermediates

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::ports::{TranscodeError, TranscodeRequest, Transcoder};
use crate::domain::error::ErrorKind;
use crate::domain::recording::RecordingFormat;

/// Conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Conversion tool not installed: {0}")]
    ToolMissing(String),

    #[error("Conversion failed: {0}")]
    Failed(String),
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ToolMissing(_) => ErrorKind::ConversionToolMissing,
            Self::Failed(_) => ErrorKind::ConversionFailed,
        }
    }
}

impl From<TranscodeError> for ConversionError {
    fn from(e: TranscodeError) -> Self {
        match e {
            TranscodeError::ToolMissing(tool) => Self::ToolMissing(tool),
            TranscodeError::Failed { diagnostic, .. } => Self::Failed(diagnostic),
            TranscodeError::Io(message) => Self::Failed(message),
        }
    }
}

/// Outcome of a background conversion, delivered to the catalog owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFinished {
    /// Intermediate file the conversion read
    pub source: PathBuf,
    /// Converted file on success
    pub result: Result<PathBuf, ConversionError>,
}

/// Runs the external converter on finished captures
#[derive(Clone)]
pub struct PostProcessor {
    transcoder: Arc<dyn Transcoder>,
}

impl PostProcessor {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self { transcoder }
    }

    /// Convert `source` into `format` next to it.
    ///
    /// The source is never touched. On failure any partial output is
    /// removed.
    pub async fn convert(
        &self,
        source: &Path,
        format: RecordingFormat,
    ) -> Result<PathBuf, ConversionError> {
        let output = source.with_extension(format.extension());
        if output == source {
            return Ok(output);
        }

        let request = TranscodeRequest::new(source, &output, format.codec());
        info!(input = %source.display(), output = %output.display(), codec = format.codec(), "converting");

        let result = match self.transcoder.transcode(&request).await {
            Ok(()) if output.exists() => Ok(output.clone()),
            Ok(()) => Err(ConversionError::Failed(format!(
                "converter produced no output at {}",
                output.display()
            ))),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &result {
            warn!(input = %source.display(), error = %e, "conversion failed, intermediate kept");
            if output.exists() {
                let _ = std::fs::remove_file(&output);
            }
        }
        result
    }

    /// Convert in the background and report on `done`
    pub fn spawn(
        &self,
        source: PathBuf,
        format: RecordingFormat,
        done: UnboundedSender<ConversionFinished>,
    ) -> JoinHandle<()> {
        let processor = self.clone();
        tokio::spawn(async move {
            let result = processor.convert(&source, format).await;
            let _ = done.send(ConversionFinished { source, result });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{FakeTranscoder, TranscoderMode};

    fn processor(mode: TranscoderMode) -> (PostProcessor, FakeTranscoder) {
        let transcoder = FakeTranscoder::new(mode);
        (PostProcessor::new(Arc::new(transcoder.clone())), transcoder)
    }

    fn intermediate(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("recording_music_20240501_090807.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        path
    }

    #[tokio::test]
    async fn converts_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let wav = intermediate(&dir);
        let (processor, transcoder) = processor(TranscoderMode::Succeed);

        let flac = processor.convert(&wav, RecordingFormat::Flac).await.unwrap();
        assert!(flac.to_string_lossy().ends_with(".flac"));
        assert!(flac.exists());
        assert!(wav.exists());

        let requests = transcoder.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].codec, "flac");
        assert_eq!(requests[0].input, wav);
    }

    #[tokio::test]
    async fn missing_tool_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let wav = intermediate(&dir);
        let (processor, _) = processor(TranscoderMode::Missing);

        let err = processor.convert(&wav, RecordingFormat::Flac).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionToolMissing);
        assert!(wav.exists());
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let wav = intermediate(&dir);
        let (processor, _) = processor(TranscoderMode::Fail("Invalid data found".into()));

        let err = processor.convert(&wav, RecordingFormat::Flac).await.unwrap_err();
        assert_eq!(err, ConversionError::Failed("Invalid data found".into()));
        assert!(wav.exists());
        assert!(!wav.with_extension("flac").exists());
    }

    #[tokio::test]
    async fn missing_output_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let wav = intermediate(&dir);
        let (processor, _) = processor(TranscoderMode::NoOutput);

        let err = processor.convert(&wav, RecordingFormat::Flac).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
    }

    #[tokio::test]
    async fn spawn_reports_on_channel() {
        let dir = tempfile::tempdir().unwrap();
        let wav = intermediate(&dir);
        let (processor, _) = processor(TranscoderMode::Succeed);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        processor.spawn(wav.clone(), RecordingFormat::Flac, tx).await.unwrap();
        let finished = rx.recv().await.unwrap();
        assert_eq!(finished.source, wav);
        assert_eq!(finished.result, Ok(wav.with_extension("flac")));
    }
}
