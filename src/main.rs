//! isocap CLI entry point

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use isocap::cli::{
    app::{load_merged_config, report, run_sessions, CliError},
    args::{Cli, Commands, MonitorAction},
    config_cmd::handle_config_command,
    daemon_app::run_daemon,
    daemon_cmd::{handle_daemon_command, save_request},
    history_cmd::handle_history_command,
    ipc::DaemonRequest,
    presenter::Presenter,
    record_app::{parse_limit, run_record, RecordOptions},
};
use isocap::domain::config::AppConfig;
use isocap::domain::error::ErrorKind;
use isocap::domain::recording::RecordingFormat;
use isocap::infrastructure::XdgConfigStore;

/// Environment variable holding the log filter
const ENV_LOG: &str = "ISOCAP_LOG";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut presenter = Presenter::new();

    let config = load_merged_config(AppConfig::empty()).await;
    init_tracing(&config);

    if cli.daemon {
        return run_daemon(config).await;
    }

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::from(ErrorKind::Usage.exit_code());
    };

    let default_format = config.format_or_default();
    let pick = |format: Option<isocap::cli::args::FormatArg>| -> RecordingFormat {
        format.map(Into::into).unwrap_or(default_format)
    };

    let result = match command {
        Commands::Sessions => run_sessions(&presenter),
        Commands::Record {
            pid,
            format,
            duration,
            output,
        } => match parse_limit(duration.as_deref()) {
            Ok(limit) => {
                let options = RecordOptions {
                    process_id: pid,
                    format: pick(format),
                    limit,
                    output,
                };
                run_record(options, &config, &mut presenter).await
            }
            Err(e) => Err(e),
        },
        Commands::Start { pid, format } => {
            let request = DaemonRequest::Start {
                process_id: pid,
                format: pick(format),
            };
            handle_daemon_command(request, &mut presenter).await
        }
        Commands::Stop => handle_daemon_command(DaemonRequest::Stop, &mut presenter).await,
        Commands::Status => handle_daemon_command(DaemonRequest::Status, &mut presenter).await,
        Commands::Monitor { action } => {
            let request = match action {
                MonitorAction::Arm { pid, format } => DaemonRequest::Arm {
                    process_id: pid,
                    format: pick(format),
                },
                MonitorAction::Disarm => DaemonRequest::Disarm,
            };
            handle_daemon_command(request, &mut presenter).await
        }
        Commands::Pending => handle_daemon_command(DaemonRequest::Pending, &mut presenter).await,
        Commands::Save {
            index,
            destination,
            tags,
            bitrate,
        } => match save_request(index, destination, tags.into(), bitrate) {
            Ok(request) => handle_daemon_command(request, &mut presenter).await,
            Err(e) => Err(e),
        },
        Commands::History { action } => handle_history_command(action, &config, &presenter).await,
        Commands::Config { action } => {
            let store = XdgConfigStore::new();
            handle_config_command(action, &store, &presenter)
                .await
                .map_err(CliError::from)
        }
    };

    report(&presenter, result)
}

/// Log to stderr, filtered by ISOCAP_LOG or the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new(config.log_level_or_default()));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
