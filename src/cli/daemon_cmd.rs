//! Daemon command handler - sends commands to running daemon via IPC

use std::path::PathBuf;

use crate::domain::recording::RecordingTags;

use super::app::CliError;
use super::args::entry_index;
use super::ipc::{create_ipc_client, send_request, DaemonRequest, DaemonResponse};
use super::presenter::Presenter;

/// Send one request to the daemon and print the reply
pub async fn handle_daemon_command(
    request: DaemonRequest,
    presenter: &mut Presenter,
) -> Result<(), CliError> {
    let client = create_ipc_client();

    let waits = matches!(request, DaemonRequest::Stop | DaemonRequest::Save { .. });
    if waits {
        presenter.start_spinner("Waiting for daemon...");
    }
    let result = send_request(client.as_ref(), &request).await;
    if waits {
        match &result {
            Ok(_) => presenter.spinner_success("Done"),
            Err(e) => presenter.spinner_fail(&e.message),
        }
    }

    show_response(&request, result?, presenter);
    Ok(())
}

/// Save request from a 1-based entry number
pub fn save_request(
    entry: usize,
    destination: PathBuf,
    tags: RecordingTags,
    bitrate_kbps: Option<u32>,
) -> Result<DaemonRequest, CliError> {
    let index = entry_index(entry)
        .ok_or_else(|| CliError::usage("Entry numbers start at 1"))?;
    Ok(DaemonRequest::Save {
        index,
        destination,
        tags,
        bitrate_kbps,
    })
}

fn show_response(request: &DaemonRequest, response: DaemonResponse, presenter: &Presenter) {
    match response {
        DaemonResponse::Ok => match request {
            DaemonRequest::Arm { process_id, format } => presenter.success(&format!(
                "Auto-start armed for PID {} ({})",
                process_id,
                format.as_str()
            )),
            DaemonRequest::Disarm => presenter.success("Auto-start disarmed"),
            _ => presenter.success("Done"),
        },
        DaemonResponse::Started {
            process_id,
            name,
            format,
            output_path,
        } => {
            presenter.success(&format!(
                "Recording {} (PID: {}) as {}",
                name,
                process_id,
                format.as_str()
            ));
            presenter.info(&format!("Writing to {}", output_path.display()));
        }
        DaemonResponse::Status { status } => presenter.status(&status),
        DaemonResponse::Record { record, warnings } => {
            for warning in &warnings {
                presenter.warn(warning);
            }
            if matches!(request, DaemonRequest::Delete { .. }) {
                presenter.success(&format!("Removed {}", record.file_path.display()));
            } else {
                presenter.info(&format!(
                    "{} {}",
                    record.format.as_str(),
                    record.duration_string()
                ));
                presenter.output(&record.file_path.display().to_string());
            }
        }
        DaemonResponse::Records { records } => {
            let empty = match request {
                DaemonRequest::Pending => "No pending recordings",
                _ => "No saved recordings",
            };
            presenter.records(&records, empty);
        }
        DaemonResponse::Error { message, .. } => presenter.error(&message),
    }
}
