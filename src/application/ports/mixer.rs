//! OS audio mixer port

use thiserror::Error;

use crate::domain::error::ErrorKind;
use crate::domain::session::SessionState;

/// Mixer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixerError {
    #[error("No default render device: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to enumerate audio sessions: {0}")]
    EnumerationFailed(String),

    #[error("Audio session {0} is no longer available")]
    SessionGone(String),

    #[error("Mixer call failed: {0}")]
    Backend(String),
}

impl MixerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            _ => ErrorKind::SessionEnumerationFailed,
        }
    }
}

/// One raw entry of the default render device's session collection.
///
/// A process may own several entries; `id` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerSession {
    pub id: String,
    pub process_id: u32,
    pub state: SessionState,
}

impl MixerSession {
    pub fn new(id: impl Into<String>, process_id: u32, state: SessionState) -> Self {
        Self {
            id: id.into(),
            process_id,
            state,
        }
    }
}

/// Port for the per-process session mixer of the default render device.
///
/// Calls are short and synchronous; implementations must be callable from
/// any thread.
pub trait SessionMixer: Send + Sync {
    /// Snapshot of every session on the default render endpoint
    fn sessions(&self) -> Result<Vec<MixerSession>, MixerError>;

    /// Read the mute flag of one session
    fn is_muted(&self, session_id: &str) -> Result<bool, MixerError>;

    /// Write the mute flag of one session
    fn set_muted(&self, session_id: &str, muted: bool) -> Result<(), MixerError>;

    /// Executable name of a running process, or None if it has exited
    fn process_name(&self, process_id: u32) -> Option<String>;
}
