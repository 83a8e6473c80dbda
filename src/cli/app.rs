//! Shared runner pieces: exit codes, config merging and adapter wiring

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::application::ports::ConfigStore;
use crate::application::{CatalogError, RecorderDeps, RecorderError, SessionDirectory};
use crate::domain::config::AppConfig;
use crate::domain::error::{ConfigError, ErrorKind};
use crate::infrastructure::{
    create_mixer, CpalLoopback, FfmpegTranscoder, FileEncoderFactory, JsonRecordStore,
    XdgConfigStore,
};

use super::presenter::Presenter;

/// Environment override for the converter executable
pub const ENV_FFMPEG: &str = "ISOCAP_FFMPEG";

pub const EXIT_SUCCESS: u8 = 0;

/// A failed command: what to show and which exit status to use
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CliError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CliError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.kind.exit_code())
    }
}

impl From<RecorderError> for CliError {
    fn from(e: RecorderError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        let kind = match e {
            ConfigError::ValidationError { .. } => ErrorKind::Usage,
            _ => ErrorKind::General,
        };
        Self::new(kind, e.to_string())
    }
}

/// Print the error and turn it into the process exit status
pub fn report(presenter: &Presenter, result: Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            presenter.error(&e.message);
            e.exit_code()
        }
    }
}

/// Load and merge configuration: defaults < file < env < cli
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    let env_config = AppConfig {
        ffmpeg_path: env::var(ENV_FFMPEG).ok().filter(|s| !s.trim().is_empty()),
        ..Default::default()
    };

    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

/// Production adapters for the recorder
pub fn recorder_deps(config: &AppConfig) -> RecorderDeps {
    let ffmpeg = config.ffmpeg_path_or_default().to_string();
    RecorderDeps {
        mixer: create_mixer(),
        source: Arc::new(CpalLoopback::new()),
        encoders: Arc::new(FileEncoderFactory::new(ffmpeg.clone())),
        transcoder: Arc::new(FfmpegTranscoder::new(ffmpeg)),
        store: Arc::new(JsonRecordStore::new(config.history_file_or_default())),
        temp_dir: config.temp_dir_or_default(),
    }
}

/// `isocap sessions`
pub fn run_sessions(presenter: &Presenter) -> Result<(), CliError> {
    let directory = SessionDirectory::new(create_mixer());
    let snapshot = directory.list_sessions();

    if let Some(e) = snapshot.error {
        return Err(CliError::new(e.kind(), e.to_string()));
    }

    presenter.sessions(&snapshot.sessions);
    Ok(())
}
