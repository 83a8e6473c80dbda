//! Daemon wire protocol: one JSON request line, one JSON response line

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::application::{MonitorTarget, PromoteOptions, RecorderError, RecorderHandle, RecorderStatus};
use crate::domain::error::ErrorKind;
use crate::domain::recording::{RecordingFormat, RecordingRecord, RecordingTags};

/// Request sent by `isocap <command>` to the daemon.
///
/// Indices are zero-based positions in the pending or saved list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DaemonRequest {
    Start {
        process_id: u32,
        format: RecordingFormat,
    },
    Stop,
    Status,
    Arm {
        process_id: u32,
        format: RecordingFormat,
    },
    Disarm,
    Pending,
    History,
    Save {
        index: usize,
        destination: PathBuf,
        #[serde(default)]
        tags: RecordingTags,
        #[serde(default)]
        bitrate_kbps: Option<u32>,
    },
    Delete {
        index: usize,
        #[serde(default)]
        delete_file: bool,
    },
}

/// Daemon reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DaemonResponse {
    Ok,
    Started {
        process_id: u32,
        name: String,
        format: RecordingFormat,
        output_path: PathBuf,
    },
    Status {
        status: RecorderStatus,
    },
    Record {
        record: RecordingRecord,
        #[serde(default)]
        warnings: Vec<String>,
    },
    Records {
        records: Vec<RecordingRecord>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl DaemonResponse {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}

impl From<RecorderError> for DaemonResponse {
    fn from(e: RecorderError) -> Self {
        Self::error(e.kind(), e.to_string())
    }
}

/// Run one request against the recorder
pub async fn dispatch(handle: &RecorderHandle, request: DaemonRequest) -> DaemonResponse {
    let result = match request {
        DaemonRequest::Start { process_id, format } => {
            handle
                .start(process_id, format)
                .await
                .map(|session| DaemonResponse::Started {
                    process_id: session.target_process_id,
                    name: session.target_name,
                    format: session.format,
                    output_path: session.output_path,
                })
        }
        DaemonRequest::Stop => handle.stop().await.map(|record| DaemonResponse::Record {
            record,
            warnings: Vec::new(),
        }),
        DaemonRequest::Status => handle
            .status()
            .await
            .map(|status| DaemonResponse::Status { status }),
        DaemonRequest::Arm { process_id, format } => handle
            .arm(MonitorTarget { process_id, format })
            .await
            .map(|()| DaemonResponse::Ok),
        DaemonRequest::Disarm => handle.disarm().await.map(|()| DaemonResponse::Ok),
        DaemonRequest::Pending => handle
            .pending()
            .await
            .map(|records| DaemonResponse::Records { records }),
        DaemonRequest::History => handle
            .history()
            .await
            .map(|records| DaemonResponse::Records { records }),
        DaemonRequest::Save {
            index,
            destination,
            tags,
            bitrate_kbps,
        } => {
            let options = PromoteOptions { tags, bitrate_kbps };
            handle
                .save(index, destination, options)
                .await
                .map(|promoted| DaemonResponse::Record {
                    record: promoted.record,
                    warnings: promoted.warnings,
                })
        }
        DaemonRequest::Delete { index, delete_file } => handle
            .delete(index, delete_file)
            .await
            .map(|removed| DaemonResponse::Record {
                record: removed.record,
                warnings: removed.warnings,
            }),
    };

    result.unwrap_or_else(DaemonResponse::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        FakeEncoders, FakeLoopback, FakeMixer, FakeTranscoder, MemoryStore, TranscoderMode,
    };
    use crate::application::{RecorderDeps, RecorderService};
    use crate::domain::session::SessionState;
    use std::sync::Arc;

    fn recorder(dir: &std::path::Path) -> RecorderHandle {
        let mixer = FakeMixer::new()
            .with_session("music", 100, "music.exe", SessionState::Active, false)
            .with_session("chat", 200, "chat.exe", SessionState::Active, false);
        let (service, handle) = RecorderService::new(RecorderDeps {
            mixer: Arc::new(mixer),
            source: Arc::new(FakeLoopback::new().auto_complete()),
            encoders: Arc::new(FakeEncoders::new()),
            transcoder: Arc::new(FakeTranscoder::new(TranscoderMode::Succeed)),
            store: Arc::new(MemoryStore::new()),
            temp_dir: dir.to_path_buf(),
        });
        tokio::spawn(service.run());
        handle
    }

    #[test]
    fn requests_use_command_tag() {
        let json = serde_json::to_string(&DaemonRequest::Start {
            process_id: 42,
            format: RecordingFormat::Flac,
        })
        .unwrap();
        assert_eq!(json, r#"{"command":"start","process_id":42,"format":"FLAC"}"#);

        let parsed: DaemonRequest = serde_json::from_str(r#"{"command":"stop"}"#).unwrap();
        assert_eq!(parsed, DaemonRequest::Stop);

        let parsed: DaemonRequest =
            serde_json::from_str(r#"{"command":"delete","index":0}"#).unwrap();
        assert_eq!(
            parsed,
            DaemonRequest::Delete {
                index: 0,
                delete_file: false
            }
        );
    }

    #[test]
    fn errors_carry_kind() {
        let json = serde_json::to_string(&DaemonResponse::error(
            ErrorKind::NotRecording,
            "Not recording",
        ))
        .unwrap();
        assert!(json.contains(r#""result":"error""#));
        assert!(json.contains(r#""kind":"not_recording""#));
    }

    #[tokio::test]
    async fn start_stop_round() {
        let dir = tempfile::tempdir().unwrap();
        let handle = recorder(dir.path());

        let started = dispatch(
            &handle,
            DaemonRequest::Start {
                process_id: 100,
                format: RecordingFormat::Wav,
            },
        )
        .await;
        match started {
            DaemonResponse::Started { name, .. } => assert_eq!(name, "music.exe"),
            other => panic!("unexpected response {:?}", other),
        }

        let stopped = dispatch(&handle, DaemonRequest::Stop).await;
        assert!(matches!(stopped, DaemonResponse::Record { .. }));

        match dispatch(&handle, DaemonRequest::Pending).await {
            DaemonResponse::Records { records } => assert_eq!(records.len(), 1),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn failures_become_error_responses() {
        let dir = tempfile::tempdir().unwrap();
        let handle = recorder(dir.path());

        let response = dispatch(&handle, DaemonRequest::Stop).await;
        assert!(matches!(
            response,
            DaemonResponse::Error {
                kind: ErrorKind::NotRecording,
                ..
            }
        ));

        let response = dispatch(
            &handle,
            DaemonRequest::Delete {
                index: 3,
                delete_file: false,
            },
        )
        .await;
        assert!(matches!(
            response,
            DaemonResponse::Error {
                kind: ErrorKind::NotFound,
                ..
            }
        ));
    }
}
