//! isocap - record one application's audio in isolation
//!
//! Captures the default output device in loopback mode while every other
//! application's audio session is muted, then restores the mutes exactly as
//! they were. Finished recordings are kept in a pending list, optionally
//! converted to FLAC in the background, and saved to a persisted history.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, state machines and the error taxonomy
//! - **Application**: Port traits, the capture components and the recorder control task
//! - **Infrastructure**: Adapters (WASAPI sessions, cpal loopback, hound, ffmpeg, JSON/TOML stores)
//! - **CLI**: Argument parsing, daemon and IPC, one-shot recording, signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
