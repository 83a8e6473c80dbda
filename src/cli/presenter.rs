//! CLI presenter for output formatting

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::RecorderStatus;
use crate::domain::capture::CaptureState;
use crate::domain::recording::{Duration, RecordingRecord};
use crate::domain::session::{AudioSession, SessionState};

const METER_WIDTH: usize = 20;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    pub fn new() -> Self {
        Self {
            spinner: None,
        }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout (paths and listings)
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Elapsed time, optional limit and a level meter
    pub fn format_progress(&self, elapsed_ms: u64, limit_ms: Option<u64>, level: f64) -> String {
        let elapsed = Duration::from_millis(elapsed_ms).as_clock();
        let time = match limit_ms {
            Some(limit) => format!("{} / {}", elapsed, Duration::from_millis(limit).as_clock()),
            None => elapsed,
        };
        format!("{} {}", time, format_meter(level))
    }

    pub fn update_recording_progress(&self, name: &str, elapsed_ms: u64, limit_ms: Option<u64>, level: f64) {
        let progress = self.format_progress(elapsed_ms, limit_ms, level);
        self.update_spinner(&format!("Recording {}... {}", name, progress));
    }

    /// Print daemon status
    pub fn daemon_status(&self, state: &str) {
        eprintln!("{} Daemon: {}", "●".cyan(), state);
    }

    /// Print a key-value pair (for config list and status)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// One line per session: pid, state, name
    pub fn sessions(&self, sessions: &[AudioSession]) {
        if sessions.is_empty() {
            self.info("No applications are playing audio");
            return;
        }
        for session in sessions {
            let state = match session.state {
                SessionState::Active => session.state.as_str().green(),
                _ => session.state.as_str().dimmed(),
            };
            println!("{:>8}  {:<8}  {}", session.process_id, state, session.process_name);
        }
    }

    /// Numbered listing of recordings, starting at 1
    pub fn records(&self, records: &[RecordingRecord], empty: &str) {
        if records.is_empty() {
            self.info(empty);
            return;
        }
        for (i, record) in records.iter().enumerate() {
            let missing = if record.exists_on_disk() {
                String::new()
            } else {
                format!(" {}", "(missing)".red())
            };
            println!(
                "{:>3}. {}  {:<4} {}  {}{}",
                i + 1,
                record.date_added_string(),
                record.format.as_str(),
                record.duration_string(),
                record.file_path.display(),
                missing
            );
        }
    }

    pub fn status(&self, status: &RecorderStatus) {
        self.key_value("state", status.state.as_str());
        if let (Some(pid), Some(name)) = (status.target_process_id, status.target_name.as_deref()) {
            self.key_value("target", &format!("{} (PID: {})", name, pid));
        }
        if let Some(format) = status.format {
            self.key_value("format", format.as_str());
        }
        if status.state != CaptureState::Idle {
            self.key_value("elapsed", &Duration::from_millis(status.elapsed_ms).as_clock());
            self.key_value("level", &format_meter(status.peak_level));
        }
        match &status.monitor {
            Some(monitor) => self.key_value(
                "auto-start",
                &format!(
                    "PID {} as {} (last seen {})",
                    monitor.process_id,
                    monitor.format.as_str(),
                    monitor.last_observed
                ),
            ),
            None => self.key_value("auto-start", "off"),
        }
        self.key_value("pending", &status.pending.to_string());
        self.key_value("saved", &status.saved.to_string());
        if status.background_jobs > 0 {
            self.key_value("background jobs", &status.background_jobs.to_string());
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bar plus percentage for a 0-100 level
fn format_meter(level: f64) -> String {
    let level = level.clamp(0.0, 100.0);
    let filled = ((level / 100.0) * METER_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "█".repeat(filled).cyan(),
        "░".repeat(METER_WIDTH - filled),
        level
    )
}
