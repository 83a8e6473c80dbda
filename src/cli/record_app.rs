//! One-shot recording runner

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::interval;
use tracing::debug;

use crate::application::{PromoteOptions, RecorderEvent, RecorderHandle, RecorderService};
use crate::domain::capture::CaptureState;
use crate::domain::config::AppConfig;
use crate::domain::error::ErrorKind;
use crate::domain::recording::{Duration, RecordingFormat, RecordingRecord};

use super::app::{recorder_deps, CliError};
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

const PROGRESS_INTERVAL: StdDuration = StdDuration::from_millis(100);

/// What to record and where to put it
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub process_id: u32,
    pub format: RecordingFormat,
    pub limit: Option<Duration>,
    pub output: Option<PathBuf>,
}

/// Parse the `--duration` argument
pub fn parse_limit(value: Option<&str>) -> Result<Option<Duration>, CliError> {
    value
        .map(|s| {
            s.parse::<Duration>()
                .map_err(|e| CliError::usage(format!("Invalid duration: {}", e)))
        })
        .transpose()
}

/// Run `isocap record`
pub async fn run_record(
    options: RecordOptions,
    config: &AppConfig,
    presenter: &mut Presenter,
) -> Result<(), CliError> {
    let signal = ShutdownSignal::new();
    signal
        .setup()
        .map_err(|e| CliError::new(ErrorKind::General, format!("Failed to setup signal handler: {}", e)))?;

    let (mut service, handle) = RecorderService::new(recorder_deps(config));
    if let Some(e) = service.load_history().await {
        presenter.warn(&format!("History unavailable: {}", e));
    }
    let events = handle.subscribe();
    let task = tokio::spawn(service.run());

    let result = record_with(&handle, events, &options, signal.flag(), presenter).await;

    // Restores any mutes still held and writes the history
    if let Err(e) = handle.shutdown().await {
        debug!(error = %e, "recorder already gone");
    }
    let _ = task.await;

    let record = result?;
    presenter.output(&record.file_path.display().to_string());
    Ok(())
}

/// Capture until the limit, a shutdown request, or the stream ends; then
/// wait for conversion and optionally save.
async fn record_with(
    handle: &RecorderHandle,
    mut events: broadcast::Receiver<RecorderEvent>,
    options: &RecordOptions,
    shutdown: Arc<AtomicBool>,
    presenter: &mut Presenter,
) -> Result<RecordingRecord, CliError> {
    let session = handle.start(options.process_id, options.format).await?;
    let name = session.target_name.clone();
    let limit_ms = options.limit.map(|d| d.as_millis());

    presenter.start_spinner(&format!("Recording {}...", name));
    let started = tokio::time::Instant::now();
    let mut ticker = interval(PROGRESS_INTERVAL);
    let mut level = 0.0;
    let mut failure = None;

    let ended_early = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let elapsed_ms = Duration::from(started.elapsed()).as_millis();
                if shutdown.load(Ordering::SeqCst) || limit_ms.is_some_and(|limit| elapsed_ms >= limit) {
                    break false;
                }
                presenter.update_recording_progress(&name, elapsed_ms, limit_ms, level);
            }
            event = events.recv() => match event {
                Ok(RecorderEvent::PeakLevel(peak)) => level = peak,
                Ok(RecorderEvent::Failure { kind, message }) => failure = Some(CliError::new(kind, message)),
                Ok(RecorderEvent::StateChanged(CaptureState::Idle)) => break true,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break true,
            }
        }
    };

    let record = if ended_early {
        // The stream stopped on its own; any failure was reported first
        if let Some(e) = failure.or_else(|| drain_failure(&mut events)) {
            presenter.spinner_fail(&e.message);
            return Err(e);
        }
        handle
            .pending()
            .await?
            .pop()
            .ok_or_else(|| CliError::new(ErrorKind::MissingOutputFile, "Capture ended without output"))?
    } else {
        presenter.update_spinner(&format!("Finishing {}...", name));
        match handle.stop().await {
            Ok(record) => record,
            Err(e) => {
                presenter.spinner_fail(&e.to_string());
                return Err(e.into());
            }
        }
    };
    presenter.spinner_success(&format!(
        "Recorded {} ({})",
        name,
        record.duration_string()
    ));

    let mut record = record;
    if record.format.needs_post_processing() {
        presenter.start_spinner(&format!("Converting to {}...", record.format.as_str()));
        handle.settle().await?;
        match drain_failure(&mut events) {
            Some(e) => {
                presenter.spinner_fail(&e.message);
                presenter.warn("Keeping the uncompressed recording");
            }
            None => presenter.spinner_success("Converted"),
        }
        if let Some(latest) = handle.pending().await?.pop() {
            record = latest;
        }
    }

    match &options.output {
        Some(destination) => {
            let index = handle.pending().await?.len().saturating_sub(1);
            let promoted = handle
                .save(index, destination.clone(), PromoteOptions::default())
                .await?;
            for warning in &promoted.warnings {
                presenter.warn(warning);
            }
            presenter.success("Saved to history");
            Ok(promoted.record)
        }
        None => Ok(record),
    }
}

/// First failure waiting in the event queue, if any
fn drain_failure(events: &mut broadcast::Receiver<RecorderEvent>) -> Option<CliError> {
    loop {
        match events.try_recv() {
            Ok(RecorderEvent::Failure { kind, message }) => return Some(CliError::new(kind, message)),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        FakeEncoders, FakeLoopback, FakeMixer, FakeTranscoder, MemoryStore, TranscoderMode,
    };
    use crate::application::RecorderDeps;
    use crate::domain::session::SessionState;

    struct Rig {
        handle: RecorderHandle,
        loopback: FakeLoopback,
        store: MemoryStore,
        _dir: tempfile::TempDir,
    }

    fn rig(mode: TranscoderMode) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let loopback = FakeLoopback::new().auto_complete();
        let store = MemoryStore::new();
        let mixer = FakeMixer::new()
            .with_session("player", 100, "player.exe", SessionState::Active, false)
            .with_session("chat", 200, "chat.exe", SessionState::Active, false);
        let (service, handle) = RecorderService::new(RecorderDeps {
            mixer: Arc::new(mixer),
            source: Arc::new(loopback.clone()),
            encoders: Arc::new(FakeEncoders::new()),
            transcoder: Arc::new(FakeTranscoder::new(mode)),
            store: Arc::new(store.clone()),
            temp_dir: dir.path().to_path_buf(),
        });
        tokio::spawn(service.run());
        Rig {
            handle,
            loopback,
            store,
            _dir: dir,
        }
    }

    fn options(format: RecordingFormat, output: Option<PathBuf>) -> RecordOptions {
        RecordOptions {
            process_id: 100,
            format,
            limit: Some(Duration::from_millis(200)),
            output,
        }
    }

    #[test]
    fn limit_parses() {
        assert_eq!(
            parse_limit(Some("2m30s")).unwrap(),
            Some(Duration::from_secs(150))
        );
        assert_eq!(parse_limit(None).unwrap(), None);
        assert_eq!(parse_limit(Some("soon")).unwrap_err().kind, ErrorKind::Usage);
    }

    #[tokio::test]
    async fn stops_at_limit() {
        let rig = rig(TranscoderMode::Succeed);
        let events = rig.handle.subscribe();
        let mut presenter = Presenter::new();

        let record = record_with(
            &rig.handle,
            events,
            &options(RecordingFormat::Wav, None),
            Arc::new(AtomicBool::new(false)),
            &mut presenter,
        )
        .await
        .unwrap();

        assert_eq!(record.format, RecordingFormat::Wav);
        assert!(record.file_path.exists());
        assert_eq!(rig.loopback.stop_requests(), 1);
    }

    #[tokio::test]
    async fn shutdown_flag_stops_early() {
        let rig = rig(TranscoderMode::Succeed);
        let events = rig.handle.subscribe();
        let mut presenter = Presenter::new();
        let mut opts = options(RecordingFormat::Mp3, None);
        opts.limit = None;

        let record = record_with(
            &rig.handle,
            events,
            &opts,
            Arc::new(AtomicBool::new(true)),
            &mut presenter,
        )
        .await
        .unwrap();
        assert_eq!(record.format, RecordingFormat::Mp3);
    }

    #[tokio::test]
    async fn flac_is_converted_and_saved() {
        let rig = rig(TranscoderMode::Succeed);
        let out = tempfile::tempdir().unwrap();
        let destination = out.path().join("take.flac");
        let events = rig.handle.subscribe();
        let mut presenter = Presenter::new();

        let record = record_with(
            &rig.handle,
            events,
            &options(RecordingFormat::Flac, Some(destination.clone())),
            Arc::new(AtomicBool::new(false)),
            &mut presenter,
        )
        .await
        .unwrap();

        assert_eq!(record.file_path, destination);
        assert!(destination.exists());
        rig.handle.shutdown().await.unwrap();
        assert_eq!(rig.store.stored().len(), 1);
    }

    #[tokio::test]
    async fn stream_failure_is_reported() {
        let rig = rig(TranscoderMode::Succeed);
        let events = rig.handle.subscribe();
        let mut presenter = Presenter::new();
        let mut opts = options(RecordingFormat::Wav, None);
        opts.limit = None;

        let loopback = rig.loopback.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_millis(50)).await;
            loopback.finish(Some(crate::application::ports::CaptureError::StreamFailed(
                "device unplugged".into(),
            )));
        });

        let err = record_with(
            &rig.handle,
            events,
            &opts,
            Arc::new(AtomicBool::new(false)),
            &mut presenter,
        )
        .await
        .unwrap_err();
        assert!(err.message.contains("device unplugged"));
        assert!(rig.handle.pending().await.unwrap().is_empty());
    }
}
