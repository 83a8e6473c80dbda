//! Per-application session mixer adapters

mod unsupported;
#[cfg(windows)]
mod wasapi;

use std::sync::Arc;

use crate::application::ports::SessionMixer;

pub use unsupported::UnsupportedMixer;
#[cfg(windows)]
pub use wasapi::WasapiMixer;

/// Mixer for the current platform.
///
/// Per-application sessions only exist on Windows; elsewhere every call
/// reports the device as unavailable.
pub fn create_mixer() -> Arc<dyn SessionMixer> {
    #[cfg(windows)]
    {
        Arc::new(WasapiMixer::new())
    }
    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedMixer)
    }
}
