//! Settings file port

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Storage for the file layer of the isocap settings (`format`,
/// `ffmpeg_path`, `temp_dir`, `history_file`, `log_level`).
///
/// Defaults, `ISOCAP_FFMPEG` and command-line values are merged on top of
/// what this returns; the store never sees them.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Settings written in the file. No file means [`AppConfig::empty`].
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Replace the file with `config`
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write [`AppConfig::defaults`] to a new file. An existing file is
    /// left untouched and reported as [`ConfigError::AlreadyExists`].
    async fn init(&self) -> Result<(), ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(
                self.path().to_string_lossy().to_string(),
            ));
        }
        self.save(&AppConfig::defaults()).await
    }
}
