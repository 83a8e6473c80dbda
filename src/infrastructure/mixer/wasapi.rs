//! WASAPI session mixer
//!
//! Every call re-opens the default render device's session manager. The
//! COM objects are thread-affine, so nothing is cached between calls.

use std::path::Path;

use tracing::debug;
use windows::core::{Interface, PWSTR};
use windows::Win32::Foundation::{CloseHandle, BOOL};
use windows::Win32::Media::Audio::{
    eMultimedia, eRender, AudioSessionStateActive, AudioSessionStateInactive,
    IAudioSessionControl, IAudioSessionControl2, IAudioSessionManager2, IMMDeviceEnumerator,
    ISimpleAudioVolume, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CLSCTX_ALL, COINIT_MULTITHREADED,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};

use crate::application::ports::{MixerError, MixerSession, SessionMixer};
use crate::domain::session::SessionState;

#[derive(Debug, Default)]
pub struct WasapiMixer;

impl WasapiMixer {
    pub fn new() -> Self {
        Self
    }

    fn session_controls() -> Result<Vec<IAudioSessionControl>, MixerError> {
        unsafe {
            // S_FALSE when this thread is already initialised
            let _ = CoInitializeEx(None, COINIT_MULTITHREADED);

            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(|e| MixerError::DeviceUnavailable(e.message()))?;
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eMultimedia)
                .map_err(|e| MixerError::DeviceUnavailable(e.message()))?;
            let manager: IAudioSessionManager2 = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| MixerError::EnumerationFailed(e.message()))?;
            let list = manager
                .GetSessionEnumerator()
                .map_err(|e| MixerError::EnumerationFailed(e.message()))?;
            let count = list
                .GetCount()
                .map_err(|e| MixerError::EnumerationFailed(e.message()))?;

            let mut controls = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
            for index in 0..count {
                match list.GetSession(index) {
                    Ok(control) => controls.push(control),
                    Err(e) => debug!(index, error = %e.message(), "skipping unreadable session"),
                }
            }
            Ok(controls)
        }
    }

    fn describe(control: &IAudioSessionControl) -> windows::core::Result<MixerSession> {
        unsafe {
            let control2: IAudioSessionControl2 = control.cast()?;
            let process_id = control2.GetProcessId()?;
            let id = take_wide(control2.GetSessionInstanceIdentifier()?);
            let state = match control.GetState()? {
                s if s == AudioSessionStateActive => SessionState::Active,
                s if s == AudioSessionStateInactive => SessionState::Inactive,
                _ => SessionState::Expired,
            };
            Ok(MixerSession::new(id, process_id, state))
        }
    }

    fn volume_of(session_id: &str) -> Result<ISimpleAudioVolume, MixerError> {
        for control in Self::session_controls()? {
            let Ok(session) = Self::describe(&control) else {
                continue;
            };
            if session.id == session_id {
                return control
                    .cast::<ISimpleAudioVolume>()
                    .map_err(|e| MixerError::Backend(e.message()));
            }
        }
        Err(MixerError::SessionGone(session_id.to_string()))
    }
}

impl SessionMixer for WasapiMixer {
    fn sessions(&self) -> Result<Vec<MixerSession>, MixerError> {
        let sessions = Self::session_controls()?
            .iter()
            .filter_map(|control| match Self::describe(control) {
                Ok(session) => Some(session),
                Err(e) => {
                    debug!(error = %e.message(), "skipping session without a single owner");
                    None
                }
            })
            .collect();
        Ok(sessions)
    }

    fn is_muted(&self, session_id: &str) -> Result<bool, MixerError> {
        let volume = Self::volume_of(session_id)?;
        unsafe { volume.GetMute() }
            .map(|muted| muted.as_bool())
            .map_err(|e| MixerError::Backend(e.message()))
    }

    fn set_muted(&self, session_id: &str, muted: bool) -> Result<(), MixerError> {
        let volume = Self::volume_of(session_id)?;
        unsafe { volume.SetMute(BOOL::from(muted), std::ptr::null()) }
            .map_err(|e| MixerError::Backend(e.message()))
    }

    fn process_name(&self, process_id: u32) -> Option<String> {
        unsafe {
            let handle =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), process_id).ok()?;
            let mut buffer = [0u16; 1024];
            let mut len = buffer.len() as u32;
            let result = QueryFullProcessImageNameW(
                handle,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &mut len,
            );
            let _ = CloseHandle(handle);
            result.ok()?;

            let full = String::from_utf16_lossy(&buffer[..len as usize]);
            Path::new(&full)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        }
    }
}

/// Copy a COM-allocated wide string and free it
unsafe fn take_wide(value: PWSTR) -> String {
    let text = value.to_string().unwrap_or_default();
    CoTaskMemFree(Some(value.0 as *const _));
    text
}
