//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::recording::{RecordingFormat, RecordingTags};

/// isocap - record one application's audio while everything else is muted
#[derive(Parser, Debug)]
#[command(name = "isocap")]
#[command(version)]
#[command(about = "Record a single application's audio output in isolation")]
#[command(long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Run as daemon (control via: isocap start/stop/status/...)
    #[arg(long)]
    pub daemon: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List applications currently holding an audio session
    Sessions,

    /// Record one application in this process until the duration elapses or Ctrl+C
    Record {
        /// Process id of the application to record
        #[arg(short = 'p', long)]
        pid: u32,

        /// Output format
        #[arg(short = 'f', long, value_enum)]
        format: Option<FormatArg>,

        /// Stop after this long (e.g., 30s, 5m, 2m30s)
        #[arg(short = 'd', long, value_name = "TIME")]
        duration: Option<String>,

        /// Save the finished recording here and add it to the history
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Start capturing in the running daemon
    Start {
        /// Process id of the application to record
        #[arg(short = 'p', long)]
        pid: u32,

        /// Output format
        #[arg(short = 'f', long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Stop the daemon's capture and wait for the file
    Stop,

    /// Show daemon state, target, level and auto-start target
    Status,

    /// Auto-start capture when an application starts playing
    Monitor {
        #[command(subcommand)]
        action: MonitorAction,
    },

    /// List finished recordings not yet saved
    Pending,

    /// Save a pending recording to a destination file
    Save {
        /// Entry number as shown by `isocap pending`
        index: usize,

        /// Destination file; the extension picks the format
        destination: PathBuf,

        #[command(flatten)]
        tags: TagArgs,

        /// MP3 bitrate in kbps
        #[arg(long, value_parser = clap::value_parser!(u32).range(32..=320))]
        bitrate: Option<u32>,
    },

    /// Saved recordings
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Auto-start actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MonitorAction {
    /// Watch an application and start capturing when it plays
    Arm {
        #[arg(short = 'p', long)]
        pid: u32,

        #[arg(short = 'f', long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Stop watching
    Disarm,
}

/// History actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum HistoryAction {
    /// List saved recordings
    List,
    /// Remove a saved recording from the history
    Delete {
        /// Entry number as shown by `isocap history list`
        index: usize,

        /// Also delete the file on disk
        #[arg(long)]
        delete_file: bool,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Tags written into a saved file
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TagArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub artist: Option<String>,

    #[arg(long)]
    pub album: Option<String>,
}

impl From<TagArgs> for RecordingTags {
    fn from(args: TagArgs) -> Self {
        RecordingTags {
            title: args.title,
            artist: args.artist,
            album: args.album,
        }
    }
}

/// Format argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Mp3,
    Wav,
    Flac,
}

impl From<FormatArg> for RecordingFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mp3 => RecordingFormat::Mp3,
            FormatArg::Wav => RecordingFormat::Wav,
            FormatArg::Flac => RecordingFormat::Flac,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "format",
    "ffmpeg_path",
    "temp_dir",
    "history_file",
    "log_level",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

/// Convert a 1-based entry number from the command line to a list index
pub fn entry_index(number: usize) -> Option<usize> {
    number.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["isocap"]);
        assert!(!cli.daemon);
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_daemon() {
        let cli = Cli::parse_from(["isocap", "--daemon"]);
        assert!(cli.daemon);
    }

    #[test]
    fn cli_parses_record() {
        let cli = Cli::parse_from([
            "isocap", "record", "--pid", "4242", "-f", "flac", "-d", "2m30s", "-o", "song.flac",
        ]);
        match cli.command {
            Some(Commands::Record {
                pid,
                format,
                duration,
                output,
            }) => {
                assert_eq!(pid, 4242);
                assert_eq!(format, Some(FormatArg::Flac));
                assert_eq!(duration.as_deref(), Some("2m30s"));
                assert_eq!(output, Some(PathBuf::from("song.flac")));
            }
            other => panic!("Expected Record command, got {:?}", other),
        }
    }

    #[test]
    fn cli_parses_save_with_tags() {
        let cli = Cli::parse_from([
            "isocap", "save", "2", "out.mp3", "--title", "Intro", "--bitrate", "320",
        ]);
        match cli.command {
            Some(Commands::Save {
                index,
                destination,
                tags,
                bitrate,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(destination, PathBuf::from("out.mp3"));
                assert_eq!(tags.title.as_deref(), Some("Intro"));
                assert!(tags.artist.is_none());
                assert_eq!(bitrate, Some(320));
            }
            other => panic!("Expected Save command, got {:?}", other),
        }
    }

    #[test]
    fn bitrate_out_of_range_is_rejected() {
        let result = Cli::try_parse_from(["isocap", "save", "1", "out.mp3", "--bitrate", "999"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_monitor_arm() {
        let cli = Cli::parse_from(["isocap", "monitor", "arm", "--pid", "7"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Monitor {
                action: MonitorAction::Arm {
                    pid: 7,
                    format: None
                }
            })
        ));
    }

    #[test]
    fn cli_parses_history_delete() {
        let cli = Cli::parse_from(["isocap", "history", "delete", "3", "--delete-file"]);
        assert!(matches!(
            cli.command,
            Some(Commands::History {
                action: HistoryAction::Delete {
                    index: 3,
                    delete_file: true
                }
            })
        ));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["isocap", "config", "set", "format", "flac"]);
        if let Some(Commands::Config {
            action: ConfigAction::Set { key, value },
        }) = cli.command
        {
            assert_eq!(key, "format");
            assert_eq!(value, "flac");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn daemon_conflicts_with_subcommand() {
        assert!(Cli::try_parse_from(["isocap", "--daemon", "status"]).is_err());
    }

    #[test]
    fn format_arg_converts() {
        assert_eq!(RecordingFormat::from(FormatArg::Flac), RecordingFormat::Flac);
        assert_eq!(RecordingFormat::from(FormatArg::Mp3), RecordingFormat::Mp3);
    }

    #[test]
    fn entry_numbers_are_one_based() {
        assert_eq!(entry_index(1), Some(0));
        assert_eq!(entry_index(0), None);
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("format"));
        assert!(is_valid_config_key("ffmpeg_path"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
