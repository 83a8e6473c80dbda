//! Application configuration

mod app_config;

pub use app_config::{AppConfig, DEFAULT_FFMPEG, DEFAULT_LOG_LEVEL};
