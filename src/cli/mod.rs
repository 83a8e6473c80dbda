//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, signal handling,
//! the daemon and its IPC client commands, and the one-shot recorder.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod daemon_app;
pub mod daemon_cmd;
pub mod history_cmd;
pub mod ipc;
pub mod pid_file;
pub mod presenter;
pub mod record_app;
pub mod signals;

// Re-export commonly used types
pub use app::{load_merged_config, report, CliError, EXIT_SUCCESS};
pub use args::{Cli, Commands, ConfigAction, HistoryAction, MonitorAction};
pub use daemon_app::run_daemon;
pub use daemon_cmd::handle_daemon_command;
pub use presenter::Presenter;
