//! Daemon app runner

use std::process::ExitCode;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::application::{RecorderEvent, RecorderService};
use crate::domain::config::AppConfig;
use crate::domain::error::ErrorKind;

use super::app::{recorder_deps, CliError, EXIT_SUCCESS};
use super::ipc::create_ipc_server;
use super::pid_file::{PidFile, PidFileError};
use super::presenter::Presenter;
use super::signals::ShutdownListener;

/// Run daemon mode
pub async fn run_daemon(config: AppConfig) -> ExitCode {
    let presenter = Presenter::new();

    let pid_file = PidFile::new();
    if let Err(e) = pid_file.acquire() {
        let message = match e {
            PidFileError::AlreadyRunning(pid) => {
                format!("Another daemon is already running (PID: {})", pid)
            }
            other => other.to_string(),
        };
        presenter.error(&message);
        return CliError::new(ErrorKind::General, message).exit_code();
    }

    let mut listener = match ShutdownListener::new() {
        Ok(listener) => listener,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            let _ = pid_file.release();
            return ExitCode::from(ErrorKind::General.exit_code());
        }
    };

    let (mut service, handle) = RecorderService::new(recorder_deps(&config));
    if let Some(e) = service.load_history().await {
        presenter.warn(&format!("Starting with empty history: {}", e));
    }

    let mut server = create_ipc_server();
    if let Err(e) = server.bind() {
        presenter.error(&format!("Failed to bind {}: {}", server.path(), e));
        let _ = pid_file.release();
        return ExitCode::from(ErrorKind::General.exit_code());
    }
    let endpoint = server.path();

    let events = handle.subscribe();
    let printer = tokio::spawn(print_events(events));
    let service_task = tokio::spawn(service.run());

    let server_handle = handle.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(server_handle).await {
            warn!(error = %e, "ipc server stopped");
        }
        server.cleanup();
    });

    presenter.daemon_status("Started, waiting for commands...");
    presenter.info(&format!(
        "PID: {} | Endpoint: {} | SIGINT: exit",
        std::process::id(),
        endpoint
    ));

    let signal = listener.recv().await;
    info!(signal, "shutting down");
    presenter.daemon_status("Shutting down...");

    // Stops any capture, restores mutes and persists history
    if let Err(e) = handle.shutdown().await {
        presenter.warn(&format!("Shutdown incomplete: {}", e));
    }
    if service_task.await.is_err() {
        warn!("recorder task panicked");
    }

    // Dropping the server removes the socket file
    server_task.abort();
    let _ = server_task.await;
    printer.abort();
    let _ = pid_file.release();

    ExitCode::from(EXIT_SUCCESS)
}

/// Mirror recorder events to the daemon's terminal
async fn print_events(mut events: broadcast::Receiver<RecorderEvent>) {
    let presenter = Presenter::new();
    loop {
        match events.recv().await {
            Ok(RecorderEvent::StateChanged(state)) => {
                presenter.daemon_status(state.as_str());
            }
            Ok(RecorderEvent::PeakLevel(level)) => debug!(level, "peak"),
            Ok(RecorderEvent::CatalogChanged) => debug!("catalog changed"),
            Ok(RecorderEvent::AutoStarted { process_id }) => {
                presenter.info(&format!("Auto-started capture of PID {}", process_id));
            }
            Ok(RecorderEvent::Warning(message)) => presenter.warn(&message),
            Ok(RecorderEvent::Failure { kind, message }) => {
                presenter.error(&format!("{} ({})", message, kind));
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
