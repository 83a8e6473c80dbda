//! Domain layer - Core business logic
//!
//! Contains value objects, entities, state machines and domain errors.
//! This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod error;
pub mod monitor;
pub mod recording;
pub mod session;

// Re-export common types
pub use capture::{CaptureLifecycle, CaptureSession, CaptureState, PeakMeter};
pub use config::AppConfig;
pub use error::*;
pub use monitor::MonitorState;
pub use recording::{Duration, RecordingFormat, RecordingRecord, RecordingTags};
pub use session::{AudioSession, MuteLedger, SessionState};
