//! Per-process audio session value objects

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process id reported for the system-sounds session; never listed or muted
pub const SYSTEM_SOUNDS_PID: u32 = 0;

/// Playback state of an audio session as reported by the mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Currently producing sound
    Active,
    /// Open but silent
    Inactive,
    /// Gone, or never seen
    #[default]
    Expired,
}

impl SessionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
        }
    }

    /// Active or Inactive; expired sessions are not offered for capture
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Inactive)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An application currently holding an audio session on the render device.
///
/// Identity is the process id; rebuilt on every enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSession {
    pub process_id: u32,
    pub process_name: String,
    pub state: SessionState,
}

impl AudioSession {
    pub fn new(process_id: u32, process_name: impl Into<String>, state: SessionState) -> Self {
        Self {
            process_id,
            process_name: process_name.into(),
            state,
        }
    }

    /// Label used in listings, e.g. `music (PID: 100)`
    pub fn display_name(&self) -> String {
        format!("{} (PID: {})", self.process_name, self.process_id)
    }
}
