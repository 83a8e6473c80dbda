//! Recording format value object

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidFormatError;

/// Bitrate of the streaming MP3 encoder used during capture (kbps)
pub const CAPTURE_MP3_BITRATE_KBPS: u32 = 192;

/// Final audio format requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordingFormat {
    #[default]
    Mp3,
    Wav,
    Flac,
}

impl RecordingFormat {
    /// All formats, in menu order
    pub const ALL: [Self; 3] = [Self::Mp3, Self::Wav, Self::Flac];

    /// Label used in listings and the history file
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::Wav => "WAV",
            Self::Flac => "FLAC",
        }
    }

    /// File extension of the final artifact (without dot)
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }

    /// Extension of the file written while capturing.
    ///
    /// FLAC is captured as WAV and converted after the stream stops.
    pub const fn capture_extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav | Self::Flac => "wav",
        }
    }

    /// Whether the captured file still needs a codec conversion
    pub const fn needs_post_processing(&self) -> bool {
        matches!(self, Self::Flac)
    }

    /// Codec name understood by the external converter
    pub const fn codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Wav => "pcm_s16le",
            Self::Flac => "flac",
        }
    }

    /// Infer the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for RecordingFormat {
    type Err = InvalidFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "flac" => Ok(Self::Flac),
            _ => Err(InvalidFormatError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RecordingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flac_is_captured_as_wav() {
        assert_eq!(RecordingFormat::Flac.capture_extension(), "wav");
        assert_eq!(RecordingFormat::Flac.extension(), "flac");
        assert!(RecordingFormat::Flac.needs_post_processing());
        assert!(!RecordingFormat::Wav.needs_post_processing());
        assert!(!RecordingFormat::Mp3.needs_post_processing());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("MP3".parse::<RecordingFormat>().unwrap(), RecordingFormat::Mp3);
        assert_eq!(" flac ".parse::<RecordingFormat>().unwrap(), RecordingFormat::Flac);
        assert!("ogg".parse::<RecordingFormat>().is_err());
    }

    #[test]
    fn from_path_uses_extension() {
        let p = PathBuf::from("/tmp/song.WAV");
        assert_eq!(RecordingFormat::from_path(&p), Some(RecordingFormat::Wav));
        assert_eq!(RecordingFormat::from_path(Path::new("/tmp/noext")), None);
    }

    #[test]
    fn serializes_as_uppercase_label() {
        let json = serde_json::to_string(&RecordingFormat::Flac).unwrap();
        assert_eq!(json, "\"FLAC\"");
        let parsed: RecordingFormat = serde_json::from_str("\"MP3\"").unwrap();
        assert_eq!(parsed, RecordingFormat::Mp3);
    }
}
