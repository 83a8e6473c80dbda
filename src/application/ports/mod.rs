//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod config;
pub mod encoder;
pub mod loopback;
pub mod mixer;
pub mod record_store;
pub mod transcoder;

// Re-export common types
pub use config::ConfigStore;
pub use encoder::{EncoderError, EncoderFactory, EncoderSink};
pub use loopback::{
    BufferHandler, CaptureError, LoopbackSource, LoopbackStream, StopNotifier, StreamFormat,
};
pub use mixer::{MixerError, MixerSession, SessionMixer};
pub use record_store::{RecordStore, StoreError};
pub use transcoder::{TranscodeError, TranscodeRequest, Transcoder};
