//! Sink selection by requested format

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{FfmpegMp3Sink, WavSink};
use crate::application::ports::{EncoderError, EncoderFactory, EncoderSink, StreamFormat};
use crate::domain::recording::RecordingFormat;

/// Builds file sinks: hound for WAV and FLAC, ffmpeg for MP3
pub struct FileEncoderFactory {
    ffmpeg: String,
    /// Set once ffmpeg has shown it carries the MP3 encoder
    mp3_checked: AtomicBool,
}

impl FileEncoderFactory {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            mp3_checked: AtomicBool::new(false),
        }
    }

    fn ensure_mp3_backend(&self) -> Result<(), EncoderError> {
        if self.mp3_checked.load(Ordering::Acquire) {
            return Ok(());
        }
        FfmpegMp3Sink::check_backend(&self.ffmpeg)?;
        self.mp3_checked.store(true, Ordering::Release);
        Ok(())
    }
}

impl EncoderFactory for FileEncoderFactory {
    fn create(
        &self,
        path: &Path,
        format: RecordingFormat,
        stream: StreamFormat,
    ) -> Result<Box<dyn EncoderSink>, EncoderError> {
        match format {
            RecordingFormat::Mp3 => {
                self.ensure_mp3_backend()?;
                Ok(Box::new(FfmpegMp3Sink::spawn(&self.ffmpeg, path, stream)?))
            }
            RecordingFormat::Wav | RecordingFormat::Flac => {
                Ok(Box::new(WavSink::create(path, stream)?))
            }
        }
    }
}
