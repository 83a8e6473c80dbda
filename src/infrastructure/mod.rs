//! Infrastructure layer - Adapter implementations
//!
//! Concrete implementations of the port interfaces: the OS mixer, the
//! loopback device, file sinks, the ffmpeg converter and file-backed
//! stores.

pub mod capture;
pub mod config;
pub mod encoding;
pub mod mixer;
pub mod store;
pub mod transcoding;

// Re-export adapters
pub use capture::CpalLoopback;
pub use config::XdgConfigStore;
pub use encoding::FileEncoderFactory;
pub use mixer::{create_mixer, UnsupportedMixer};
pub use store::JsonRecordStore;
pub use transcoding::FfmpegTranscoder;
