//! Application layer - Use cases and port interfaces
//!
//! Holds the session directory, the mute coordinator, the capture
//! pipeline, the activity monitor, the post-processor and the recording
//! catalog, plus the control task that ties them together.

pub mod capture;
pub mod catalog;
pub mod monitor;
pub mod mute_coordinator;
pub mod ports;
pub mod post_processor;
pub mod recorder;
pub mod session_directory;

#[cfg(test)]
pub(crate) mod test_support;

pub use capture::{CapturePipeline, PipelineError, StreamStopped};
pub use catalog::{CatalogError, PromoteOptions, Promoted, RecordingCatalog, Removed};
pub use monitor::{ActivityMonitor, MonitorTarget};
pub use mute_coordinator::MuteCoordinator;
pub use post_processor::{ConversionError, ConversionFinished, PostProcessor};
pub use recorder::{
    MonitorStatus, RecorderCommand, RecorderDeps, RecorderError, RecorderEvent, RecorderHandle,
    RecorderService, RecorderStatus,
};
pub use session_directory::{SessionDirectory, SessionSnapshot};
