//! Capture lifecycle state machine

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl CaptureState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: CaptureState,
    pub action: &'static str,
}

/// Capture lifecycle.
///
/// State machine:
///   IDLE -> STARTING (begin_start)
///   STARTING -> RECORDING (mark_recording)
///   STARTING | RECORDING -> IDLE (fault)
///   RECORDING -> STOPPING (request_stop)
///   RECORDING | STOPPING -> IDLE (finish)
///
/// `finish` is accepted from RECORDING because the device may end the
/// stream on its own.
#[derive(Debug, Default)]
pub struct CaptureLifecycle {
    state: CaptureState,
}

impl CaptureLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    pub fn begin_start(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(&[CaptureState::Idle], CaptureState::Starting, "start capture")
    }

    pub fn mark_recording(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(&[CaptureState::Starting], CaptureState::Recording, "begin streaming")
    }

    pub fn fault(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            &[CaptureState::Starting, CaptureState::Recording],
            CaptureState::Idle,
            "abort capture",
        )
    }

    pub fn request_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(&[CaptureState::Recording], CaptureState::Stopping, "stop capture")
    }

    pub fn finish(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            &[CaptureState::Recording, CaptureState::Stopping],
            CaptureState::Idle,
            "finish capture",
        )
    }

    fn transition(
        &mut self,
        from: &[CaptureState],
        to: CaptureState,
        action: &'static str,
    ) -> Result<(), InvalidStateTransition> {
        if !from.contains(&self.state) {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action,
            });
        }
        self.state = to;
        Ok(())
    }
}
