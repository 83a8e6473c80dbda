//! Capture session entity

use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::domain::recording::RecordingFormat;

/// The single in-flight capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    pub target_process_id: u32,
    pub target_name: String,
    pub format: RecordingFormat,
    /// Temporary file being written
    pub output_path: PathBuf,
    pub started_at: DateTime<Local>,
}

impl CaptureSession {
    /// Elapsed wall time since the capture started, in milliseconds
    pub fn elapsed_ms(&self, now: DateTime<Local>) -> u64 {
        (now - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Temporary file name for a capture of `process_name` started at `now`.
///
/// `recording_<process>_<yyyyMMdd_HHmmss>.<ext>` where the extension is
/// the container written during capture.
pub fn temp_file_name(process_name: &str, format: RecordingFormat, now: DateTime<Local>) -> String {
    format!(
        "recording_{}_{}.{}",
        sanitize(process_name),
        now.format("%Y%m%d_%H%M%S"),
        format.capture_extension()
    )
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}
