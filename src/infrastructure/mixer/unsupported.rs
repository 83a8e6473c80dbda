//! Mixer for platforms without per-application audio sessions

use crate::application::ports::{MixerError, MixerSession, SessionMixer};

const REASON: &str = "per-application audio sessions are only available on Windows";

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedMixer;

impl SessionMixer for UnsupportedMixer {
    fn sessions(&self) -> Result<Vec<MixerSession>, MixerError> {
        Err(MixerError::DeviceUnavailable(REASON.into()))
    }

    fn is_muted(&self, _session_id: &str) -> Result<bool, MixerError> {
        Err(MixerError::DeviceUnavailable(REASON.into()))
    }

    fn set_muted(&self, _session_id: &str, _muted: bool) -> Result<(), MixerError> {
        Err(MixerError::DeviceUnavailable(REASON.into()))
    }

    fn process_name(&self, _process_id: u32) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_call_reports_no_device() {
        let mixer = UnsupportedMixer;
        assert!(matches!(mixer.sessions(), Err(MixerError::DeviceUnavailable(_))));
        assert!(mixer.set_muted("any", true).is_err());
        assert_eq!(mixer.process_name(1), None);
    }
}
