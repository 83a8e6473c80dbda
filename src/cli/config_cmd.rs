//! Config command handler

use tracing_subscriber::EnvFilter;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::recording::RecordingFormat;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let value = normalize_value(key, value)?;

    let mut config = store.load().await?;
    *field_mut(&mut config, key)? = Some(value.clone());

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    presenter.output(field(&config, key).unwrap_or(NOT_SET));

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(key, field(&config, key).unwrap_or(NOT_SET));
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
        })
    }
}

fn field<'a>(config: &'a AppConfig, key: &str) -> Option<&'a str> {
    match key {
        "format" => config.format.as_deref(),
        "ffmpeg_path" => config.ffmpeg_path.as_deref(),
        "temp_dir" => config.temp_dir.as_deref(),
        "history_file" => config.history_file.as_deref(),
        "log_level" => config.log_level.as_deref(),
        _ => None,
    }
}

fn field_mut<'a>(config: &'a mut AppConfig, key: &str) -> Result<&'a mut Option<String>, ConfigError> {
    match key {
        "format" => Ok(&mut config.format),
        "ffmpeg_path" => Ok(&mut config.ffmpeg_path),
        "temp_dir" => Ok(&mut config.temp_dir),
        "history_file" => Ok(&mut config.history_file),
        "log_level" => Ok(&mut config.log_level),
        _ => Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: "Unknown key".to_string(),
        }),
    }
}

/// Validate a value for `key` and return the form to store
fn normalize_value(key: &str, value: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };

    match key {
        "format" => value
            .parse::<RecordingFormat>()
            .map(|format| format.extension().to_string())
            .map_err(|e| invalid(e.to_string())),
        "log_level" => EnvFilter::try_new(value)
            .map(|_| value.to_string())
            .map_err(|e| invalid(format!("Invalid log filter: {}", e))),
        _ => {
            if value.trim().is_empty() {
                Err(invalid("Value must not be empty".to_string()))
            } else {
                Ok(value.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::XdgConfigStore;

    #[test]
    fn format_is_normalized() {
        assert_eq!(normalize_value("format", "FLAC").unwrap(), "flac");
        assert_eq!(normalize_value("format", " wav ").unwrap(), "wav");
    }

    #[test]
    fn format_invalid() {
        assert!(normalize_value("format", "ogg").is_err());
    }

    #[test]
    fn log_level_accepts_filters() {
        assert!(normalize_value("log_level", "debug").is_ok());
        assert!(normalize_value("log_level", "isocap=trace,warn").is_ok());
        assert!(normalize_value("log_level", "isocap=loud").is_err());
    }

    #[test]
    fn paths_must_not_be_empty() {
        assert!(normalize_value("temp_dir", "  ").is_err());
        assert!(normalize_value("ffmpeg_path", "/usr/bin/ffmpeg").is_ok());
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(check_key("api_key").is_err());
        assert!(check_key("history_file").is_ok());
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let presenter = Presenter::new();

        handle_set(&store, &presenter, "format", "Flac").await.unwrap();
        handle_set(&store, &presenter, "temp_dir", "/tmp/caps").await.unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.format.as_deref(), Some("flac"));
        assert_eq!(config.temp_dir.as_deref(), Some("/tmp/caps"));
        assert!(config.history_file.is_none());
    }

    #[tokio::test]
    async fn set_invalid_value_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let presenter = Presenter::new();

        let err = handle_set(&store, &presenter, "format", "ogg").await.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
        assert!(!store.exists());
    }
}
