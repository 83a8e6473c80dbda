//! `isocap history`: through the daemon when one runs, else on the file

use std::sync::Arc;

use crate::application::ports::RecordStore;
use crate::application::{RecordingCatalog, Removed};
use crate::domain::config::AppConfig;
use crate::domain::error::ErrorKind;
use crate::domain::recording::RecordingRecord;
use crate::infrastructure::JsonRecordStore;

use super::app::CliError;
use super::args::{entry_index, HistoryAction};
use super::ipc::{create_ipc_client, send_request, DaemonRequest, DaemonResponse};
use super::presenter::Presenter;

const EMPTY_HISTORY: &str = "No saved recordings";

/// Handle history subcommand
pub async fn handle_history_command(
    action: HistoryAction,
    config: &AppConfig,
    presenter: &Presenter,
) -> Result<(), CliError> {
    let client = create_ipc_client();
    let daemon = client.is_daemon_running();
    let store: Arc<dyn RecordStore> =
        Arc::new(JsonRecordStore::new(config.history_file_or_default()));

    match action {
        HistoryAction::List => {
            let records = if daemon {
                match send_request(client.as_ref(), &DaemonRequest::History).await? {
                    DaemonResponse::Records { records } => records,
                    _ => Vec::new(),
                }
            } else {
                local_history(store).await?
            };
            presenter.records(&records, EMPTY_HISTORY);
        }
        HistoryAction::Delete { index, delete_file } => {
            let index = entry_index(index)
                .ok_or_else(|| CliError::usage("Entry numbers start at 1"))?;
            let removed = if daemon {
                let request = DaemonRequest::Delete { index, delete_file };
                match send_request(client.as_ref(), &request).await? {
                    DaemonResponse::Record { record, warnings } => Removed { record, warnings },
                    other => {
                        return Err(CliError::new(
                            ErrorKind::General,
                            format!("Unexpected daemon reply: {:?}", other),
                        ))
                    }
                }
            } else {
                local_delete(store, index, delete_file).await?
            };

            for warning in &removed.warnings {
                presenter.warn(warning);
            }
            presenter.success(&format!("Removed {}", removed.record.file_path.display()));
        }
    }
    Ok(())
}

/// Saved recordings whose files still exist
async fn local_history(store: Arc<dyn RecordStore>) -> Result<Vec<RecordingRecord>, CliError> {
    let mut catalog = RecordingCatalog::new(store);
    catalog.load().await?;
    Ok(catalog.saved().to_vec())
}

async fn local_delete(
    store: Arc<dyn RecordStore>,
    index: usize,
    delete_file: bool,
) -> Result<Removed, CliError> {
    let mut catalog = RecordingCatalog::new(store);
    catalog.load().await?;
    Ok(catalog.remove(index, delete_file).await?)
}
