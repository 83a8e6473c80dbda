//! Audio session value objects and the mute ledger

mod audio_session;
mod mute_ledger;

pub use audio_session::{AudioSession, SessionState, SYSTEM_SOUNDS_PID};
pub use mute_ledger::MuteLedger;
