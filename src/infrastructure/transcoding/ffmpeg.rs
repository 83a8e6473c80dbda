//! FFmpeg transcoder adapter

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::ports::{TranscodeError, TranscodeRequest, Transcoder};
use crate::domain::config::DEFAULT_FFMPEG;

/// Runs `ffmpeg -i <input> -c:a <codec> <output>` as a child process
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the argument list for one conversion
    fn build_args(request: &TranscodeRequest) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            request.input.to_string_lossy().to_string(),
            "-c:a".to_string(),
            request.codec.clone(),
        ];

        if let Some(kbps) = request.bitrate_kbps {
            args.push("-b:a".to_string());
            args.push(format!("{}k", kbps));
        }

        for (key, value) in &request.metadata {
            args.push("-metadata".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(request.output.to_string_lossy().to_string());
        args
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

/// First non-blank line of a converter's error stream
pub fn first_diagnostic_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no diagnostic output")
        .to_string()
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError> {
        let args = Self::build_args(request);
        debug!(program = %self.program, ?args, "running converter");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::ToolMissing(self.program.clone())
                } else {
                    TranscodeError::Io(e.to_string())
                }
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                code: output.status.code(),
                diagnostic: first_diagnostic_line(&output.stderr),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TranscodeRequest {
        TranscodeRequest::new("/tmp/in.wav", "/tmp/out.flac", "flac")
    }

    #[test]
    fn args_name_input_codec_and_output() {
        let args = FfmpegTranscoder::build_args(&request());
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/tmp/in.wav");
        let codec = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[codec + 1], "flac");
        assert_eq!(args.last().unwrap(), "/tmp/out.flac");
        assert!(args.contains(&"-y".to_string()));
        assert!(!args.contains(&"-b:a".to_string()));
    }

    #[test]
    fn args_carry_bitrate_and_tags() {
        let request = TranscodeRequest::new("in.wav", "out.mp3", "libmp3lame")
            .with_bitrate(Some(320))
            .with_metadata("title", "Night Drive")
            .with_metadata("artist", "Someone");
        let args = FfmpegTranscoder::build_args(&request);

        let bitrate = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[bitrate + 1], "320k");
        assert!(args.contains(&"title=Night Drive".to_string()));
        assert!(args.contains(&"artist=Someone".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp3");
    }

    #[test]
    fn diagnostic_skips_blank_lines() {
        assert_eq!(
            first_diagnostic_line(b"\n  in.wav: No such file or directory\nmore"),
            "in.wav: No such file or directory"
        );
        assert_eq!(first_diagnostic_line(b""), "no diagnostic output");
    }

    #[tokio::test]
    async fn missing_program_is_tool_missing() {
        let transcoder = FfmpegTranscoder::new("isocap-no-such-converter");
        let err = transcoder.transcode(&request()).await.unwrap_err();
        assert_eq!(
            err,
            TranscodeError::ToolMissing("isocap-no-such-converter".to_string())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let transcoder = FfmpegTranscoder::new("false");
        let err = transcoder.transcode(&request()).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Failed { code: Some(1), .. }));
    }
}
