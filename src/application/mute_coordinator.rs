//! Mute bookkeeping that isolates one application's audio

use std::sync::Arc;

use tracing::{debug, warn};

use super::ports::SessionMixer;
use crate::domain::session::{MuteLedger, SYSTEM_SOUNDS_PID};

/// Mutes every other application during a capture and restores them after.
///
/// Both operations are best-effort. A failure on one session is logged and
/// the rest are still processed.
#[derive(Clone)]
pub struct MuteCoordinator {
    mixer: Arc<dyn SessionMixer>,
}

impl MuteCoordinator {
    pub fn new(mixer: Arc<dyn SessionMixer>) -> Self {
        Self { mixer }
    }

    /// Mute every live session not owned by `target_process_id` and return
    /// the original flags.
    pub fn apply_isolation(&self, target_process_id: u32) -> MuteLedger {
        let mut ledger = MuteLedger::new();

        let sessions = match self.mixer.sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "cannot enumerate sessions, other applications stay audible");
                return ledger;
            }
        };

        for session in sessions {
            if session.process_id == SYSTEM_SOUNDS_PID
                || session.process_id == target_process_id
                || !session.state.is_live()
            {
                continue;
            }

            let original = match self.mixer.is_muted(&session.id) {
                Ok(muted) => muted,
                Err(e) => {
                    warn!(pid = session.process_id, error = %e, "failed to read mute flag");
                    continue;
                }
            };
            ledger.remember(session.process_id, original);

            match self.mixer.set_muted(&session.id, true) {
                Ok(()) => debug!(pid = session.process_id, original, "muted"),
                Err(e) => warn!(pid = session.process_id, error = %e, "failed to mute"),
            }
        }

        ledger
    }

    /// Restore the flags recorded in `ledger`, then clear it.
    ///
    /// Returns how many sessions were restored.
    pub fn revert_isolation(&self, ledger: &mut MuteLedger) -> usize {
        if ledger.is_empty() {
            return 0;
        }

        let sessions = match self.mixer.sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, entries = ledger.len(), "cannot enumerate sessions to restore mutes");
                ledger.clear();
                return 0;
            }
        };

        let mut restored = 0;
        for session in sessions {
            let Some(original) = ledger.original(session.process_id) else {
                continue;
            };
            match self.mixer.set_muted(&session.id, original) {
                Ok(()) => {
                    restored += 1;
                    debug!(pid = session.process_id, muted = original, "restored");
                }
                Err(e) => warn!(pid = session.process_id, error = %e, "failed to restore mute"),
            }
        }

        ledger.clear();
        restored
    }
}
