//! Named Pipe communication for daemon control on Windows

use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::windows::named_pipe::{self, ClientOptions, ServerOptions};
use tracing::warn;

use super::{serve_connection, IpcClient, IpcServer};
use crate::application::RecorderHandle;

/// Named pipe path
const PIPE_NAME: &str = r"\\.\pipe\isocap";

/// Named pipe path resolver
#[derive(Debug, Clone)]
pub struct PipePath {
    path: String,
}

impl PipePath {
    pub fn new() -> Self {
        Self {
            path: PIPE_NAME.to_string(),
        }
    }

    /// Get the pipe path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if the pipe is being served
    pub fn exists(&self) -> bool {
        std::fs::metadata(&self.path).is_ok()
    }
}

impl Default for PipePath {
    fn default() -> Self {
        Self::new()
    }
}

/// Named Pipe server for daemon commands
pub struct NamedPipeServer {
    pipe_path: PipePath,
    first: Mutex<Option<named_pipe::NamedPipeServer>>,
}

impl NamedPipeServer {
    pub fn new(pipe_path: PipePath) -> Self {
        Self {
            pipe_path,
            first: Mutex::new(None),
        }
    }
}

#[async_trait]
impl IpcServer for NamedPipeServer {
    fn bind(&mut self) -> io::Result<()> {
        // Creating the first instance fails if another daemon owns the name
        let server = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&self.pipe_path.path)?;
        self.first = Mutex::new(Some(server));
        Ok(())
    }

    fn path(&self) -> String {
        self.pipe_path.path().to_string()
    }

    async fn run(&self, handle: RecorderHandle) -> io::Result<()> {
        let first = self
            .first
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "pipe state poisoned"))?
            .take();
        let mut server =
            first.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Pipe not bound"))?;

        loop {
            server.connect().await?;
            let connected = server;
            // Next instance exists before the connected one is handed off
            server = ServerOptions::new().create(&self.pipe_path.path)?;

            let handle = handle.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(connected, handle).await {
                    warn!(error = %e, "pipe connection error");
                }
            });
        }
    }

    fn cleanup(&self) {
        // Pipe instances vanish when the server handles drop
    }
}

/// Named Pipe client for sending commands to daemon
pub struct NamedPipeClient {
    pipe_path: PipePath,
}

impl NamedPipeClient {
    pub fn new(pipe_path: PipePath) -> Self {
        Self { pipe_path }
    }
}

#[async_trait]
impl IpcClient for NamedPipeClient {
    fn is_daemon_running(&self) -> bool {
        self.pipe_path.exists()
    }

    async fn send_line(&self, line: &str) -> io::Result<String> {
        let client = ClientOptions::new().open(&self.pipe_path.path)?;
        let (reader, mut writer) = tokio::io::split(client);

        writer.write_all(format!("{}\n", line).as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        reader.read_line(&mut response).await?;

        Ok(response)
    }
}
