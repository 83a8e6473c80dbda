//! IPC (Inter-Process Communication) module for daemon control
//!
//! Provides platform-specific implementations:
//! - Unix (Linux/macOS): Unix Domain Sockets
//! - Windows: Named Pipes

#[cfg(windows)]
mod named_pipe;
pub mod protocol;
#[cfg(unix)]
mod unix_socket;

#[cfg(windows)]
pub use named_pipe::{NamedPipeClient, NamedPipeServer, PipePath};
pub use protocol::{dispatch, DaemonRequest, DaemonResponse};
#[cfg(unix)]
pub use unix_socket::{SocketPath, UnixSocketClient, UnixSocketServer};

use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::application::RecorderHandle;
use crate::domain::error::ErrorKind;

use super::app::CliError;

/// Environment override for where the socket and PID file live
pub const ENV_RUNTIME_DIR: &str = "ISOCAP_RUNTIME_DIR";

/// Directory for the daemon's socket and PID file.
///
/// `ISOCAP_RUNTIME_DIR`, then `XDG_RUNTIME_DIR`, then the temp dir.
pub fn runtime_dir() -> PathBuf {
    std::env::var(ENV_RUNTIME_DIR)
        .or_else(|_| std::env::var("XDG_RUNTIME_DIR"))
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Trait for IPC servers that listen for daemon commands
#[async_trait::async_trait]
pub trait IpcServer: Send + Sync {
    /// Bind to the IPC endpoint
    fn bind(&mut self) -> io::Result<()>;

    /// Get the path/name of the IPC endpoint
    fn path(&self) -> String;

    /// Accept connections and answer each request from the recorder
    async fn run(&self, handle: RecorderHandle) -> io::Result<()>;

    /// Cleanup IPC resources
    fn cleanup(&self);
}

/// Trait for IPC clients that send commands to the daemon
#[async_trait::async_trait]
pub trait IpcClient: Send + Sync {
    /// Check if daemon appears to be running (endpoint exists)
    fn is_daemon_running(&self) -> bool;

    /// Send one line and read one line back
    async fn send_line(&self, line: &str) -> io::Result<String>;
}

/// Answer a single request on an accepted connection
pub(crate) async fn serve_connection<T>(stream: T, handle: RecorderHandle) -> io::Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let response = match serde_json::from_str::<DaemonRequest>(line.trim()) {
        Ok(request) => {
            debug!(?request, "ipc request");
            dispatch(&handle, request).await
        }
        Err(e) => DaemonResponse::error(ErrorKind::Usage, format!("Invalid request: {}", e)),
    };

    let mut payload = serde_json::to_string(&response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

/// Send a request to the running daemon.
///
/// Daemon-side failures come back as `Err` with the daemon's error kind.
pub async fn send_request(
    client: &dyn IpcClient,
    request: &DaemonRequest,
) -> Result<DaemonResponse, CliError> {
    if !client.is_daemon_running() {
        return Err(CliError::new(
            ErrorKind::DaemonUnavailable,
            "No daemon running. Start with: isocap --daemon",
        ));
    }

    let line = serde_json::to_string(request)
        .map_err(|e| CliError::new(ErrorKind::General, e.to_string()))?;
    let reply = client.send_line(&line).await.map_err(|e| {
        CliError::new(
            ErrorKind::DaemonUnavailable,
            format!("Failed to communicate with daemon: {}", e),
        )
    })?;

    match serde_json::from_str::<DaemonResponse>(reply.trim()) {
        Ok(DaemonResponse::Error { kind, message }) => Err(CliError::new(kind, message)),
        Ok(response) => Ok(response),
        Err(e) => Err(CliError::new(
            ErrorKind::General,
            format!("Unreadable daemon reply: {}", e),
        )),
    }
}

/// Create the appropriate IPC server for the current platform
#[cfg(unix)]
pub fn create_ipc_server() -> Box<dyn IpcServer> {
    Box::new(UnixSocketServer::new(SocketPath::new()))
}

#[cfg(windows)]
pub fn create_ipc_server() -> Box<dyn IpcServer> {
    Box::new(NamedPipeServer::new(PipePath::new()))
}

/// Create the appropriate IPC client for the current platform
#[cfg(unix)]
pub fn create_ipc_client() -> Box<dyn IpcClient> {
    Box::new(UnixSocketClient::new(SocketPath::new()))
}

#[cfg(windows)]
pub fn create_ipc_client() -> Box<dyn IpcClient> {
    Box::new(NamedPipeClient::new(PipePath::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedClient {
        running: bool,
        reply: io::Result<String>,
    }

    #[async_trait::async_trait]
    impl IpcClient for ScriptedClient {
        fn is_daemon_running(&self) -> bool {
            self.running
        }

        async fn send_line(&self, _line: &str) -> io::Result<String> {
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn missing_daemon_is_unavailable() {
        let client = ScriptedClient {
            running: false,
            reply: Ok(String::new()),
        };
        let err = send_request(&client, &DaemonRequest::Status).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DaemonUnavailable);
    }

    #[tokio::test]
    async fn daemon_error_keeps_kind() {
        let client = ScriptedClient {
            running: true,
            reply: Ok(r#"{"result":"error","kind":"already_recording","message":"busy"}"#.into()),
        };
        let err = send_request(&client, &DaemonRequest::Stop).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyRecording);
        assert_eq!(err.message, "busy");
    }

    #[tokio::test]
    async fn broken_connection_is_unavailable() {
        let client = ScriptedClient {
            running: true,
            reply: Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
        };
        let err = send_request(&client, &DaemonRequest::Pending).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DaemonUnavailable);
    }

    #[tokio::test]
    async fn ok_reply_passes_through() {
        let client = ScriptedClient {
            running: true,
            reply: Ok("{\"result\":\"ok\"}\n".into()),
        };
        let response = send_request(&client, &DaemonRequest::Disarm).await.unwrap();
        assert_eq!(response, DaemonResponse::Ok);
    }
}
