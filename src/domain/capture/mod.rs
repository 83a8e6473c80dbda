//! Capture lifecycle, session entity and level metering

mod peak;
mod session;
mod state;

pub use peak::{clamp_level, peak_level, PeakMeter, BYTES_PER_SAMPLE};
pub use session::{temp_file_name, CaptureSession};
pub use state::{CaptureLifecycle, CaptureState, InvalidStateTransition};
