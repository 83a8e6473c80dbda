//! Per-process audio session enumeration

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::ports::{MixerError, SessionMixer};
use crate::domain::session::{AudioSession, SessionState, SYSTEM_SOUNDS_PID};

/// Result of one enumeration.
///
/// Enumeration never fails outright: a device or session-manager failure
/// yields an empty list with the error attached.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub sessions: Vec<AudioSession>,
    pub error: Option<MixerError>,
}

/// Read-only view of the default render device's sessions
#[derive(Clone)]
pub struct SessionDirectory {
    mixer: Arc<dyn SessionMixer>,
}

impl SessionDirectory {
    pub fn new(mixer: Arc<dyn SessionMixer>) -> Self {
        Self { mixer }
    }

    /// List live sessions, one per process, sorted by process name.
    ///
    /// System sounds, expired sessions and sessions whose process has
    /// exited are dropped. When a process owns several sessions it is
    /// reported Active if any of them is.
    pub fn list_sessions(&self) -> SessionSnapshot {
        let raw = match self.mixer.sessions() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "session enumeration failed");
                return SessionSnapshot {
                    sessions: Vec::new(),
                    error: Some(e),
                };
            }
        };

        let mut by_process: BTreeMap<u32, AudioSession> = BTreeMap::new();
        for entry in raw {
            if entry.process_id == SYSTEM_SOUNDS_PID || !entry.state.is_live() {
                continue;
            }
            if let Some(existing) = by_process.get_mut(&entry.process_id) {
                if entry.state == SessionState::Active {
                    existing.state = SessionState::Active;
                }
                continue;
            }
            let Some(name) = self.mixer.process_name(entry.process_id) else {
                debug!(pid = entry.process_id, "skipping session of exited process");
                continue;
            };
            by_process.insert(
                entry.process_id,
                AudioSession::new(entry.process_id, name, entry.state),
            );
        }

        let mut sessions: Vec<AudioSession> = by_process.into_values().collect();
        sessions.sort_by(|a, b| {
            a.process_name
                .cmp(&b.process_name)
                .then(a.process_id.cmp(&b.process_id))
        });

        SessionSnapshot {
            sessions,
            error: None,
        }
    }

    /// Current state of one process's audio.
    ///
    /// Expired when the process has no live session or the device cannot be
    /// queried.
    pub fn get_state(&self, process_id: u32) -> SessionState {
        if process_id == SYSTEM_SOUNDS_PID {
            return SessionState::Expired;
        }
        let raw = match self.mixer.sessions() {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, pid = process_id, "state query failed");
                return SessionState::Expired;
            }
        };

        raw.iter()
            .filter(|s| s.process_id == process_id)
            .map(|s| s.state)
            .fold(SessionState::Expired, |acc, state| match (acc, state) {
                (SessionState::Active, _) | (_, SessionState::Active) => SessionState::Active,
                (SessionState::Inactive, _) | (_, SessionState::Inactive) => {
                    SessionState::Inactive
                }
                _ => SessionState::Expired,
            })
    }

    /// Executable name of a running process
    pub fn process_name(&self, process_id: u32) -> Option<String> {
        self.mixer.process_name(process_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::FakeMixer;
    use std::collections::HashSet;

    fn directory(mixer: FakeMixer) -> SessionDirectory {
        SessionDirectory::new(Arc::new(mixer))
    }

    #[test]
    fn excludes_system_sounds_and_duplicates() {
        let dir = directory(
            FakeMixer::new()
                .with_session("sys", 0, "System", SessionState::Active, false)
                .with_session("a1", 100, "music.exe", SessionState::Inactive, false)
                .with_session("a2", 100, "music.exe", SessionState::Active, false)
                .with_session("b", 200, "chat.exe", SessionState::Inactive, false),
        );

        let snapshot = dir.list_sessions();
        assert!(snapshot.error.is_none());
        assert!(snapshot.sessions.iter().all(|s| s.process_id != 0));
        let ids: HashSet<u32> = snapshot.sessions.iter().map(|s| s.process_id).collect();
        assert_eq!(ids.len(), snapshot.sessions.len());
        let music = snapshot
            .sessions
            .iter()
            .find(|s| s.process_id == 100)
            .unwrap();
        assert_eq!(music.state, SessionState::Active);
    }

    #[test]
    fn sorted_by_process_name() {
        let dir = directory(
            FakeMixer::new()
                .with_session("a", 100, "music.exe", SessionState::Active, false)
                .with_session("b", 200, "chat.exe", SessionState::Inactive, false),
        );

        let names: Vec<String> = dir
            .list_sessions()
            .sessions
            .into_iter()
            .map(|s| s.process_name)
            .collect();
        assert_eq!(names, vec!["chat.exe", "music.exe"]);
    }

    #[test]
    fn drops_expired_and_exited() {
        let mixer = FakeMixer::new()
            .with_session("a", 100, "music.exe", SessionState::Expired, false)
            .with_session("b", 200, "chat.exe", SessionState::Active, false)
            .with_session("c", 300, "game.exe", SessionState::Active, false);
        mixer.forget_process(300);
        let dir = directory(mixer);

        let sessions = dir.list_sessions().sessions;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].process_id, 200);
    }

    #[test]
    fn device_failure_yields_empty_list_with_error() {
        let mixer = FakeMixer::new().with_session("a", 100, "music.exe", SessionState::Active, false);
        mixer.fail_enumeration(MixerError::DeviceUnavailable("no endpoint".into()));
        let dir = directory(mixer);

        let snapshot = dir.list_sessions();
        assert!(snapshot.sessions.is_empty());
        assert!(matches!(snapshot.error, Some(MixerError::DeviceUnavailable(_))));
        assert_eq!(dir.get_state(100), SessionState::Expired);
    }

    #[test]
    fn recovers_once_the_device_is_back() {
        let mixer = Arc::new(FakeMixer::new().with_session(
            "a",
            100,
            "music.exe",
            SessionState::Active,
            false,
        ));
        mixer.fail_enumeration(MixerError::DeviceUnavailable("endpoint removed".into()));
        let dir = SessionDirectory::new(Arc::clone(&mixer) as Arc<dyn SessionMixer>);
        assert!(dir.list_sessions().error.is_some());

        mixer.restore_enumeration();
        let snapshot = dir.list_sessions();
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.sessions.len(), 1);
        assert_eq!(dir.get_state(100), SessionState::Active);
    }

    #[test]
    fn get_state_for_single_process() {
        let dir = directory(
            FakeMixer::new()
                .with_session("a", 100, "music.exe", SessionState::Active, false)
                .with_session("b", 200, "chat.exe", SessionState::Inactive, false),
        );

        assert_eq!(dir.get_state(100), SessionState::Active);
        assert_eq!(dir.get_state(200), SessionState::Inactive);
        assert_eq!(dir.get_state(999), SessionState::Expired);
        assert_eq!(dir.get_state(0), SessionState::Expired);
    }
}
