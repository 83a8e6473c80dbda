//! External converter adapters

mod ffmpeg;

pub use ffmpeg::{first_diagnostic_line, FfmpegTranscoder};
