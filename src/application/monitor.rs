//! Auto-start monitor

use tracing::{debug, info};

use super::session_directory::SessionDirectory;
use crate::domain::monitor::MonitorState;
use crate::domain::recording::RecordingFormat;
use crate::domain::session::SessionState;

/// Process watched by the monitor and the format to capture it in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTarget {
    pub process_id: u32,
    pub format: RecordingFormat,
}

/// Polls one target's session state and reports when it starts playing.
///
/// The monitor only compares states; the owner decides what to do with a
/// trigger and drives ticks from a single timer.
pub struct ActivityMonitor {
    directory: SessionDirectory,
    target: Option<MonitorTarget>,
    state: MonitorState,
}

impl ActivityMonitor {
    pub fn new(directory: SessionDirectory) -> Self {
        Self {
            directory,
            target: None,
            state: MonitorState::new(),
        }
    }

    pub fn target(&self) -> Option<MonitorTarget> {
        self.target
    }

    pub fn is_armed(&self) -> bool {
        self.state.is_armed()
    }

    pub fn last_observed(&self) -> SessionState {
        self.state.last_observed()
    }

    /// Watch `target`, replacing any previous one
    pub fn arm(&mut self, target: MonitorTarget) {
        info!(pid = target.process_id, format = %target.format, "auto-start armed");
        self.target = Some(target);
        self.state.arm();
    }

    pub fn disarm(&mut self) {
        if self.target.take().is_some() {
            info!("auto-start disarmed");
        }
        self.state.disarm();
    }

    /// A capture started or finished.
    ///
    /// The target's state at this moment becomes the previous reading, so
    /// a target still playing after a manual stop does not restart capture.
    pub fn on_capture_transition(&mut self) {
        match self.target {
            Some(target) if self.state.is_armed() => {
                let current = self.directory.get_state(target.process_id);
                debug!(pid = target.process_id, %current, "monitor primed");
                self.state.prime(current);
            }
            _ => self.state.reset(),
        }
    }

    /// Whether the poll timer should be running
    pub fn should_poll(&self, capturing: bool) -> bool {
        self.state.is_armed() && !capturing
    }

    /// One poll. Returns the target when it went from idle to playing.
    pub fn tick(&mut self, capturing: bool) -> Option<MonitorTarget> {
        if !self.should_poll(capturing) {
            return None;
        }
        let target = self.target?;

        let current = self.directory.get_state(target.process_id);
        let previous = self.state.last_observed();
        if self.state.observe(current) {
            debug!(pid = target.process_id, %previous, %current, "target became active");
            return Some(target);
        }
        None
    }
}
