//! Domain error types

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>s, <number>m, or <number>m<number>s (e.g., 30s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when an unknown recording format is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid format: \"{input}\". Valid formats are: mp3, wav, flac")]
pub struct InvalidFormatError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

/// Failure categories surfaced to the user.
///
/// Each kind maps to a distinct process exit status so scripts can branch
/// on the reason a command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    General,
    Usage,
    DeviceUnavailable,
    SessionEnumerationFailed,
    ProcessVanished,
    EncoderUnavailable,
    /// The encoder died or rejected audio after the capture started
    EncoderFailed,
    AlreadyRecording,
    NotRecording,
    MissingOutputFile,
    ConversionToolMissing,
    ConversionFailed,
    StoreCorrupt,
    FileOpFailed,
    NotFound,
    DaemonUnavailable,
}

impl ErrorKind {
    /// Process exit status for this kind
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::General => 1,
            Self::Usage => 2,
            Self::DeviceUnavailable => 10,
            Self::SessionEnumerationFailed => 11,
            Self::ProcessVanished => 12,
            Self::EncoderUnavailable => 13,
            Self::AlreadyRecording => 14,
            Self::NotRecording => 15,
            Self::MissingOutputFile => 16,
            Self::ConversionToolMissing => 17,
            Self::ConversionFailed => 18,
            Self::StoreCorrupt => 19,
            Self::FileOpFailed => 20,
            Self::NotFound => 21,
            Self::DaemonUnavailable => 22,
            Self::EncoderFailed => 23,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Usage => "usage",
            Self::DeviceUnavailable => "device_unavailable",
            Self::SessionEnumerationFailed => "session_enumeration_failed",
            Self::ProcessVanished => "process_vanished",
            Self::EncoderUnavailable => "encoder_unavailable",
            Self::EncoderFailed => "encoder_failed",
            Self::AlreadyRecording => "already_recording",
            Self::NotRecording => "not_recording",
            Self::MissingOutputFile => "missing_output_file",
            Self::ConversionToolMissing => "conversion_tool_missing",
            Self::ConversionFailed => "conversion_failed",
            Self::StoreCorrupt => "store_corrupt",
            Self::FileOpFailed => "file_op_failed",
            Self::NotFound => "not_found",
            Self::DaemonUnavailable => "daemon_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
