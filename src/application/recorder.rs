//! Recorder control context
//!
//! One task owns the capture pipeline, the activity monitor and the
//! catalog. Commands, stream completions, background job results and
//! monitor ticks are all handled on that task, one at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::capture::{CapturePipeline, PipelineError, StreamStopped};
use super::catalog::{CatalogError, PromoteOptions, Promoted, PromotionJob, RecordingCatalog, Removed};
use super::monitor::{ActivityMonitor, MonitorTarget};
use super::ports::{EncoderFactory, LoopbackSource, RecordStore, SessionMixer, Transcoder};
use super::post_processor::{ConversionFinished, PostProcessor};
use super::session_directory::SessionDirectory;
use crate::domain::capture::{CaptureSession, CaptureState};
use crate::domain::error::ErrorKind;
use crate::domain::monitor::MONITOR_INTERVAL;
use crate::domain::recording::{RecordingFormat, RecordingRecord};
use crate::domain::session::SessionState;

/// How often the peak level is sampled for observers while capturing
const METER_INTERVAL: StdDuration = StdDuration::from_millis(100);

/// How long shutdown waits for the stream to report completion
const SHUTDOWN_GRACE: StdDuration = StdDuration::from_secs(2);

const COMMAND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 64;

/// Errors surfaced by the recorder
#[derive(Debug, Clone, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Recorder is not running")]
    Closed,
}

impl RecorderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Pipeline(e) => e.kind(),
            Self::Catalog(e) => e.kind(),
            Self::Closed => ErrorKind::DaemonUnavailable,
        }
    }
}

/// Observable recorder events
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    StateChanged(CaptureState),
    PeakLevel(f64),
    CatalogChanged,
    AutoStarted { process_id: u32 },
    Warning(String),
    Failure { kind: ErrorKind, message: String },
}

/// Armed auto-start target as reported by status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub process_id: u32,
    pub format: RecordingFormat,
    pub last_observed: SessionState,
}

/// Snapshot of the recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderStatus {
    pub state: CaptureState,
    pub target_process_id: Option<u32>,
    pub target_name: Option<String>,
    pub format: Option<RecordingFormat>,
    pub elapsed_ms: u64,
    pub peak_level: f64,
    pub monitor: Option<MonitorStatus>,
    pub pending: usize,
    pub saved: usize,
    pub background_jobs: usize,
}

type Reply<T> = oneshot::Sender<T>;

/// Requests handled by the control task
pub enum RecorderCommand {
    Start {
        process_id: u32,
        format: RecordingFormat,
        reply: Reply<Result<CaptureSession, RecorderError>>,
    },
    /// Replies once the stream has stopped and the output is finalized
    Stop {
        reply: Reply<Result<RecordingRecord, RecorderError>>,
    },
    Status {
        reply: Reply<RecorderStatus>,
    },
    Arm {
        target: MonitorTarget,
        reply: Reply<()>,
    },
    Disarm {
        reply: Reply<()>,
    },
    Pending {
        reply: Reply<Vec<RecordingRecord>>,
    },
    History {
        reply: Reply<Vec<RecordingRecord>>,
    },
    Save {
        index: usize,
        destination: PathBuf,
        options: PromoteOptions,
        reply: Reply<Result<Promoted, RecorderError>>,
    },
    Delete {
        index: usize,
        delete_file: bool,
        reply: Reply<Result<Removed, RecorderError>>,
    },
    /// Replies when no conversion or save is running
    Settle {
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Adapters the recorder is built from
pub struct RecorderDeps {
    pub mixer: Arc<dyn SessionMixer>,
    pub source: Arc<dyn LoopbackSource>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub transcoder: Arc<dyn Transcoder>,
    pub store: Arc<dyn RecordStore>,
    pub temp_dir: PathBuf,
}

/// Cloneable client of the control task
#[derive(Clone)]
pub struct RecorderHandle {
    commands: mpsc::Sender<RecorderCommand>,
    events: broadcast::Sender<RecorderEvent>,
}

impl RecorderHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RecorderCommand,
    ) -> Result<T, RecorderError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| RecorderError::Closed)?;
        rx.await.map_err(|_| RecorderError::Closed)
    }

    pub async fn start(
        &self,
        process_id: u32,
        format: RecordingFormat,
    ) -> Result<CaptureSession, RecorderError> {
        self.request(|reply| RecorderCommand::Start {
            process_id,
            format,
            reply,
        })
        .await?
    }

    pub async fn stop(&self) -> Result<RecordingRecord, RecorderError> {
        self.request(|reply| RecorderCommand::Stop { reply }).await?
    }

    pub async fn status(&self) -> Result<RecorderStatus, RecorderError> {
        self.request(|reply| RecorderCommand::Status { reply }).await
    }

    pub async fn arm(&self, target: MonitorTarget) -> Result<(), RecorderError> {
        self.request(|reply| RecorderCommand::Arm { target, reply }).await
    }

    pub async fn disarm(&self) -> Result<(), RecorderError> {
        self.request(|reply| RecorderCommand::Disarm { reply }).await
    }

    pub async fn pending(&self) -> Result<Vec<RecordingRecord>, RecorderError> {
        self.request(|reply| RecorderCommand::Pending { reply }).await
    }

    pub async fn history(&self) -> Result<Vec<RecordingRecord>, RecorderError> {
        self.request(|reply| RecorderCommand::History { reply }).await
    }

    pub async fn save(
        &self,
        index: usize,
        destination: PathBuf,
        options: PromoteOptions,
    ) -> Result<Promoted, RecorderError> {
        self.request(|reply| RecorderCommand::Save {
            index,
            destination,
            options,
            reply,
        })
        .await?
    }

    pub async fn delete(&self, index: usize, delete_file: bool) -> Result<Removed, RecorderError> {
        self.request(|reply| RecorderCommand::Delete {
            index,
            delete_file,
            reply,
        })
        .await?
    }

    pub async fn settle(&self) -> Result<(), RecorderError> {
        self.request(|reply| RecorderCommand::Settle { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), RecorderError> {
        self.request(|reply| RecorderCommand::Shutdown { reply }).await
    }
}

struct PromotionFinished {
    job: PromotionJob,
    outcome: Result<Vec<String>, CatalogError>,
    reply: Reply<Result<Promoted, RecorderError>>,
}

/// State owned by the control task
struct RecorderCore {
    pipeline: CapturePipeline,
    monitor: ActivityMonitor,
    catalog: RecordingCatalog,
    post: PostProcessor,
    transcoder: Arc<dyn Transcoder>,
    events: broadcast::Sender<RecorderEvent>,
    conversions_tx: mpsc::UnboundedSender<ConversionFinished>,
    promotions_tx: mpsc::UnboundedSender<PromotionFinished>,
    stop_waiters: Vec<Reply<Result<RecordingRecord, RecorderError>>>,
    settle_waiters: Vec<Reply<()>>,
    background_jobs: usize,
}

/// The control task
pub struct RecorderService {
    core: RecorderCore,
    commands: mpsc::Receiver<RecorderCommand>,
    stopped_rx: mpsc::UnboundedReceiver<StreamStopped>,
    conversions_rx: mpsc::UnboundedReceiver<ConversionFinished>,
    promotions_rx: mpsc::UnboundedReceiver<PromotionFinished>,
}

impl RecorderService {
    /// Build the service and its first handle. Run it with
    /// [`RecorderService::run`].
    pub fn new(deps: RecorderDeps) -> (Self, RecorderHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        let (stopped_tx, stopped_rx) = mpsc::unbounded_channel();
        let (conversions_tx, conversions_rx) = mpsc::unbounded_channel();
        let (promotions_tx, promotions_rx) = mpsc::unbounded_channel();

        let pipeline = CapturePipeline::new(
            Arc::clone(&deps.mixer),
            deps.source,
            deps.encoders,
            deps.temp_dir,
            stopped_tx,
        );
        let monitor = ActivityMonitor::new(SessionDirectory::new(deps.mixer));

        let core = RecorderCore {
            pipeline,
            monitor,
            catalog: RecordingCatalog::new(deps.store),
            post: PostProcessor::new(Arc::clone(&deps.transcoder)),
            transcoder: deps.transcoder,
            events: events.clone(),
            conversions_tx,
            promotions_tx,
            stop_waiters: Vec::new(),
            settle_waiters: Vec::new(),
            background_jobs: 0,
        };

        let handle = RecorderHandle {
            commands: commands_tx,
            events,
        };
        let service = Self {
            core,
            commands,
            stopped_rx,
            conversions_rx,
            promotions_rx,
        };
        (service, handle)
    }

    /// Load the saved history.
    ///
    /// A corrupt store leaves the history empty and is returned as a
    /// warning for the caller to show.
    pub async fn load_history(&mut self) -> Option<CatalogError> {
        match self.core.catalog.load().await {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "history unavailable, starting empty");
                Some(e)
            }
        }
    }

    /// Serve until a shutdown command arrives or every handle is dropped
    pub async fn run(self) {
        let Self {
            mut core,
            mut commands,
            mut stopped_rx,
            mut conversions_rx,
            mut promotions_rx,
        } = self;

        let mut poll = interval(MONITOR_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut meter = interval(METER_INTERVAL);
        meter.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let capturing = core.pipeline.is_capturing();
            let polling = core.monitor.should_poll(capturing);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(RecorderCommand::Shutdown { reply }) => {
                        core.shutdown(&mut stopped_rx).await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => core.handle(command).await,
                    None => {
                        core.shutdown(&mut stopped_rx).await;
                        break;
                    }
                },
                Some(event) = stopped_rx.recv() => core.on_stream_stopped(event).await,
                Some(done) = conversions_rx.recv() => core.on_conversion_finished(done).await,
                Some(done) = promotions_rx.recv() => core.on_promotion_finished(done).await,
                _ = poll.tick(), if polling => core.on_monitor_tick(),
                _ = meter.tick(), if capturing => core.publish_level(),
            }
        }
        debug!("recorder stopped");
    }
}

impl RecorderCore {
    fn emit(&self, event: RecorderEvent) {
        let _ = self.events.send(event);
    }

    fn fail(&self, kind: ErrorKind, message: String) {
        error!(kind = %kind, "{}", message);
        self.emit(RecorderEvent::Failure { kind, message });
    }

    async fn handle(&mut self, command: RecorderCommand) {
        match command {
            RecorderCommand::Start {
                process_id,
                format,
                reply,
            } => {
                let _ = reply.send(self.start(process_id, format));
            }
            RecorderCommand::Stop { reply } => match self.pipeline.stop() {
                Ok(()) => {
                    self.emit(RecorderEvent::StateChanged(self.pipeline.state()));
                    self.stop_waiters.push(reply);
                }
                Err(e) => {
                    let _ = reply.send(Err(e.into()));
                }
            },
            RecorderCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            RecorderCommand::Arm { target, reply } => {
                self.monitor.arm(target);
                let _ = reply.send(());
            }
            RecorderCommand::Disarm { reply } => {
                self.monitor.disarm();
                let _ = reply.send(());
            }
            RecorderCommand::Pending { reply } => {
                let _ = reply.send(self.catalog.pending().to_vec());
            }
            RecorderCommand::History { reply } => {
                let _ = reply.send(self.catalog.saved().to_vec());
            }
            RecorderCommand::Save {
                index,
                destination,
                options,
                reply,
            } => self.begin_save(index, destination, options, reply),
            RecorderCommand::Delete {
                index,
                delete_file,
                reply,
            } => {
                let result = self.catalog.remove(index, delete_file).await;
                match &result {
                    Ok(removed) => {
                        for warning in &removed.warnings {
                            self.emit(RecorderEvent::Warning(warning.clone()));
                        }
                        self.emit(RecorderEvent::CatalogChanged);
                    }
                    Err(e) => self.fail(e.kind(), e.to_string()),
                }
                let _ = reply.send(result.map_err(Into::into));
            }
            RecorderCommand::Settle { reply } => {
                if self.background_jobs == 0 {
                    let _ = reply.send(());
                } else {
                    self.settle_waiters.push(reply);
                }
            }
            RecorderCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn start(
        &mut self,
        process_id: u32,
        format: RecordingFormat,
    ) -> Result<CaptureSession, RecorderError> {
        match self.pipeline.start(process_id, format) {
            Ok(session) => {
                self.monitor.on_capture_transition();
                self.emit(RecorderEvent::StateChanged(CaptureState::Recording));
                Ok(session)
            }
            Err(e) => {
                self.fail(e.kind(), e.to_string());
                Err(e.into())
            }
        }
    }

    fn status(&self) -> RecorderStatus {
        let current = self.pipeline.current();
        RecorderStatus {
            state: self.pipeline.state(),
            target_process_id: current.map(|s| s.target_process_id),
            target_name: current.map(|s| s.target_name.clone()),
            format: current.map(|s| s.format),
            elapsed_ms: current.map(|s| s.elapsed_ms(Local::now())).unwrap_or(0),
            peak_level: self.pipeline.peak_level(),
            monitor: self.monitor.target().map(|target| MonitorStatus {
                process_id: target.process_id,
                format: target.format,
                last_observed: self.monitor.last_observed(),
            }),
            pending: self.catalog.pending().len(),
            saved: self.catalog.saved().len(),
            background_jobs: self.background_jobs,
        }
    }

    async fn on_stream_stopped(&mut self, event: StreamStopped) {
        let result = self.pipeline.on_stream_stopped(event);
        self.finish_capture(result);
    }

    /// Common tail of every capture: record the output, start conversion,
    /// answer stop waiters.
    fn finish_capture(&mut self, result: Result<Option<RecordingRecord>, PipelineError>) {
        let outcome = match result {
            Ok(None) => return,
            Ok(Some(record)) => Ok(record),
            Err(e) => Err(e),
        };

        self.monitor.on_capture_transition();

        // Observers see the outcome before the state change
        match &outcome {
            Ok(record) => {
                self.catalog.add(record.clone());
                self.emit(RecorderEvent::CatalogChanged);
                if record.format.needs_post_processing() {
                    self.start_conversion(record);
                }
            }
            Err(e) => self.fail(e.kind(), e.to_string()),
        }
        self.emit(RecorderEvent::StateChanged(CaptureState::Idle));

        for waiter in self.stop_waiters.drain(..) {
            let _ = waiter.send(outcome.clone().map_err(RecorderError::from));
        }
    }

    fn start_conversion(&mut self, record: &RecordingRecord) {
        self.catalog.mark_busy(&record.file_path);
        self.background_jobs += 1;
        self.post.spawn(
            record.file_path.clone(),
            record.format,
            self.conversions_tx.clone(),
        );
    }

    async fn on_conversion_finished(&mut self, done: ConversionFinished) {
        self.catalog.release(&done.source);
        match done.result {
            Ok(converted) => {
                if self.catalog.repoint(&done.source, &converted).await {
                    if let Err(e) = std::fs::remove_file(&done.source) {
                        warn!(path = %done.source.display(), error = %e, "failed to delete intermediate");
                    }
                    info!(path = %converted.display(), "conversion finished");
                    self.emit(RecorderEvent::CatalogChanged);
                } else {
                    warn!(path = %done.source.display(), "converted file has no matching record");
                }
            }
            Err(e) => self.fail(e.kind(), e.to_string()),
        }
        self.job_done();
    }

    fn begin_save(
        &mut self,
        index: usize,
        destination: PathBuf,
        options: PromoteOptions,
        reply: Reply<Result<Promoted, RecorderError>>,
    ) {
        let job = match self.catalog.begin_promote(index, destination, options) {
            Ok(job) => job,
            Err(e) => {
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        self.background_jobs += 1;
        let transcoder = Arc::clone(&self.transcoder);
        let done = self.promotions_tx.clone();
        tokio::spawn(async move {
            let outcome = job.run(transcoder.as_ref()).await;
            let _ = done.send(PromotionFinished {
                job,
                outcome,
                reply,
            });
        });
    }

    async fn on_promotion_finished(&mut self, done: PromotionFinished) {
        let result = self.catalog.complete_promote(done.job, done.outcome).await;
        match &result {
            Ok(promoted) => {
                for warning in &promoted.warnings {
                    self.emit(RecorderEvent::Warning(warning.clone()));
                }
                self.emit(RecorderEvent::CatalogChanged);
            }
            Err(e) => self.fail(e.kind(), e.to_string()),
        }
        let _ = done.reply.send(result.map_err(Into::into));
        self.job_done();
    }

    fn job_done(&mut self) {
        self.background_jobs = self.background_jobs.saturating_sub(1);
        if self.background_jobs == 0 {
            for waiter in self.settle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn on_monitor_tick(&mut self) {
        let capturing = self.pipeline.is_capturing();
        if let Some(target) = self.monitor.tick(capturing) {
            info!(pid = target.process_id, "target started playing, starting capture");
            if self.start(target.process_id, target.format).is_ok() {
                self.emit(RecorderEvent::AutoStarted {
                    process_id: target.process_id,
                });
            }
        }
    }

    fn publish_level(&self) {
        self.emit(RecorderEvent::PeakLevel(self.pipeline.peak_level()));
    }

    /// Stop any capture, restore mutes and write the history
    async fn shutdown(&mut self, stopped_rx: &mut mpsc::UnboundedReceiver<StreamStopped>) {
        info!("recorder shutting down");
        self.monitor.disarm();

        if self.pipeline.state() == CaptureState::Recording {
            let _ = self.pipeline.stop();
        }
        while self.pipeline.is_capturing() {
            match timeout(SHUTDOWN_GRACE, stopped_rx.recv()).await {
                Ok(Some(event)) => self.on_stream_stopped(event).await,
                _ => {
                    let result = self.pipeline.force_stopped();
                    self.finish_capture(result);
                    break;
                }
            }
        }

        if self.background_jobs > 0 {
            warn!(jobs = self.background_jobs, "exiting with background jobs still running");
        }
        if let Err(e) = self.catalog.persist().await {
            warn!(error = %e, "failed to save history on shutdown");
        }
    }
}
