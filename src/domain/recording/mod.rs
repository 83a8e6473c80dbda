//! Recording value objects and the history record entity

mod duration;
mod format;
mod record;

pub use duration::Duration;
pub use format::{RecordingFormat, CAPTURE_MP3_BITRATE_KBPS};
pub use record::{RecordingRecord, RecordingTags};
