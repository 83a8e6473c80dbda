//! Auto-start monitor state

use std::time::Duration as StdDuration;

use crate::domain::session::SessionState;

/// Poll interval of the activity monitor
pub const MONITOR_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Edge detector over successive session-state readings.
///
/// Fires on an Inactive/Expired -> Active transition while armed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorState {
    last_observed: SessionState,
    armed: bool,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            last_observed: SessionState::Expired,
            armed: false,
        }
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn last_observed(&self) -> SessionState {
        self.last_observed
    }

    /// Arm the detector; the previous reading starts out as Expired
    pub fn arm(&mut self) {
        self.armed = true;
        self.reset();
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.reset();
    }

    /// Forget the previous reading
    pub fn reset(&mut self) {
        self.last_observed = SessionState::Expired;
    }

    /// Take `current` as the previous reading without treating it as an
    /// edge. A target that is still playing then has to go quiet before it
    /// can fire again.
    pub fn prime(&mut self, current: SessionState) {
        self.last_observed = current;
    }

    /// Record `current` and report whether it is an idle -> active edge.
    ///
    /// Readings are ignored while disarmed.
    pub fn observe(&mut self, current: SessionState) -> bool {
        if !self.armed {
            return false;
        }
        let fired = matches!(
            self.last_observed,
            SessionState::Inactive | SessionState::Expired
        ) && current == SessionState::Active;
        self.last_observed = current;
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_rising_edge() {
        let mut state = MonitorState::new();
        state.arm();
        assert!(!state.observe(SessionState::Inactive));
        assert!(state.observe(SessionState::Active));
        assert!(!state.observe(SessionState::Active));
        assert!(!state.observe(SessionState::Inactive));
        assert!(state.observe(SessionState::Active));
    }

    #[test]
    fn expired_to_active_fires() {
        let mut state = MonitorState::new();
        state.arm();
        assert!(state.observe(SessionState::Active));
    }

    #[test]
    fn disarmed_never_fires() {
        let mut state = MonitorState::new();
        assert!(!state.observe(SessionState::Active));
        state.arm();
        state.disarm();
        assert!(!state.observe(SessionState::Active));
        assert_eq!(state.last_observed(), SessionState::Expired);
    }

    #[test]
    fn primed_active_reading_does_not_fire() {
        let mut state = MonitorState::new();
        state.arm();
        state.prime(SessionState::Active);
        assert!(!state.observe(SessionState::Active));
        assert!(!state.observe(SessionState::Inactive));
        assert!(state.observe(SessionState::Active));
    }

    #[test]
    fn reset_forgets_previous_reading() {
        let mut state = MonitorState::new();
        state.arm();
        state.observe(SessionState::Active);
        state.reset();
        assert_eq!(state.last_observed(), SessionState::Expired);
        assert!(state.is_armed());
    }
}
