//! Auto-start monitor state

mod state;

pub use state::{MonitorState, MONITOR_INTERVAL};
