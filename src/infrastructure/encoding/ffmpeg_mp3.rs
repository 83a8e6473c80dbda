//! MP3 capture sink streaming PCM into ffmpeg

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::application::ports::{EncoderError, EncoderSink, StreamFormat};
use crate::domain::recording::{RecordingFormat, CAPTURE_MP3_BITRATE_KBPS};
use crate::infrastructure::transcoding::first_diagnostic_line;

/// How long a freshly spawned encoder gets to reject its arguments
const STARTUP_GRACE: Duration = Duration::from_millis(200);

/// Live MP3 encoder: raw f32le on stdin, a 192 kbps file on disk
pub struct FfmpegMp3Sink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegMp3Sink {
    /// Ask `program` whether it was built with the MP3 encoder.
    ///
    /// A missing executable, a failing query or a build without the encoder
    /// are all reported as [`EncoderError::Unavailable`].
    pub fn check_backend(program: &str) -> Result<(), EncoderError> {
        let codec = RecordingFormat::Mp3.codec();
        let output = Command::new(program)
            .args(["-hide_banner", "-h", &format!("encoder={}", codec)])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Self::launch_error(program, e))?;

        if !output.status.success() {
            return Err(EncoderError::Unavailable(format!(
                "'{}' could not be queried: {}",
                program,
                first_diagnostic_line(&output.stderr)
            )));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        if !listing.contains(&format!("Encoder {}", codec)) {
            return Err(EncoderError::Unavailable(format!(
                "'{}' was built without the {} encoder",
                program, codec
            )));
        }
        Ok(())
    }

    pub fn spawn(program: &str, path: &Path, stream: StreamFormat) -> Result<Self, EncoderError> {
        let args = Self::build_args(path, stream);
        debug!(program, ?args, "starting mp3 encoder");

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::launch_error(program, e))?;

        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.kill();
            return Err(EncoderError::Unavailable("encoder input not available".into()));
        }

        thread::sleep(STARTUP_GRACE);
        if let Ok(Some(status)) = child.try_wait() {
            let mut stderr = Vec::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_end(&mut stderr);
            }
            return Err(EncoderError::Unavailable(format!(
                "encoder exited at startup ({}): {}",
                status,
                first_diagnostic_line(&stderr)
            )));
        }

        Ok(Self { child, stdin })
    }

    fn launch_error(program: &str, e: std::io::Error) -> EncoderError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EncoderError::Unavailable(format!("MP3 encoder '{}' not found", program))
        } else {
            EncoderError::Unavailable(e.to_string())
        }
    }

    fn build_args(path: &Path, stream: StreamFormat) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-f".to_string(),
            "f32le".to_string(),
            "-ar".to_string(),
            stream.sample_rate.to_string(),
            "-ac".to_string(),
            stream.channels.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-c:a".to_string(),
            RecordingFormat::Mp3.codec().to_string(),
            "-b:a".to_string(),
            format!("{}k", CAPTURE_MP3_BITRATE_KBPS),
            path.to_string_lossy().to_string(),
        ]
    }
}

impl EncoderSink for FfmpegMp3Sink {
    fn write(&mut self, pcm: &[u8]) -> Result<(), EncoderError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EncoderError::WriteFailed("encoder already closed".into()))?;
        stdin
            .write_all(pcm)
            .map_err(|e| EncoderError::WriteFailed(e.to_string()))
    }

    fn finalize(mut self: Box<Self>) -> Result<(), EncoderError> {
        // Closing stdin is the end-of-stream signal
        drop(self.stdin.take());

        let output = self
            .child
            .wait_with_output()
            .map_err(|e| EncoderError::FinalizeFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(EncoderError::FinalizeFailed(first_diagnostic_line(
                &output.stderr,
            )));
        }
        Ok(())
    }
}
