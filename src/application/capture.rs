//! Capture pipeline: loopback stream into an encoder sink
//!
//! The pipeline is owned by a single control context. The audio callback
//! only measures the peak level and hands the buffer to a writer thread;
//! stream completion comes back to the owner as a [`StreamStopped`] event.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self as std_mpsc, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Local;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::mute_coordinator::MuteCoordinator;
use super::ports::{
    BufferHandler, CaptureError, EncoderError, EncoderFactory, EncoderSink, LoopbackSource,
    LoopbackStream, MixerError, SessionMixer, StopNotifier, StreamFormat,
};
use super::session_directory::SessionDirectory;
use crate::domain::capture::{
    peak_level, temp_file_name, CaptureLifecycle, CaptureSession, CaptureState, PeakMeter,
};
use crate::domain::error::ErrorKind;
use crate::domain::recording::{Duration, RecordingFormat, RecordingRecord};
use crate::domain::session::MuteLedger;

/// Buffers queued between the audio callback and the writer thread
const SINK_QUEUE_DEPTH: usize = 256;

/// Completion signal of a loopback stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStopped {
    pub capture_id: u64,
    pub error: Option<CaptureError>,
}

/// Capture pipeline errors
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("A capture is already in progress")]
    AlreadyRecording,

    #[error("No capture is in progress")]
    NotRecording,

    #[error("Process {0} is no longer running")]
    ProcessVanished(u32),

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error("Capture finished but {} is missing", .0.display())]
    MissingOutputFile(PathBuf),

    #[error("Failed to prepare output: {0}")]
    Io(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRecording => ErrorKind::AlreadyRecording,
            Self::NotRecording => ErrorKind::NotRecording,
            Self::ProcessVanished(_) => ErrorKind::ProcessVanished,
            Self::EncoderUnavailable(_) => ErrorKind::EncoderUnavailable,
            Self::Capture(CaptureError::DeviceUnavailable(_)) => ErrorKind::DeviceUnavailable,
            Self::Encoder(_) => ErrorKind::EncoderFailed,
            Self::Capture(_) => ErrorKind::General,
            Self::MissingOutputFile(_) => ErrorKind::MissingOutputFile,
            Self::Io(_) => ErrorKind::FileOpFailed,
        }
    }
}

enum SinkMessage {
    Pcm(Vec<u8>),
    Finish,
}

/// Drains captured buffers into the encoder off the audio thread
struct SinkWriter {
    tx: SyncSender<SinkMessage>,
    handle: Option<JoinHandle<Result<u64, EncoderError>>>,
    overruns: Arc<AtomicU64>,
}

impl SinkWriter {
    /// Start the writer thread.
    ///
    /// The first failed write ends the capture early: a completion for
    /// `capture_id` goes out on `stopped_tx` and the failure itself is
    /// returned from [`SinkWriter::finish`].
    fn spawn(
        mut sink: Box<dyn EncoderSink>,
        capture_id: u64,
        stopped_tx: UnboundedSender<StreamStopped>,
    ) -> Result<Self, PipelineError> {
        let (tx, rx) = std_mpsc::sync_channel::<SinkMessage>(SINK_QUEUE_DEPTH);

        let handle = std::thread::Builder::new()
            .name("isocap-sink".to_string())
            .spawn(move || {
                let mut written: u64 = 0;
                let mut failure = None;
                while let Ok(message) = rx.recv() {
                    match message {
                        SinkMessage::Pcm(bytes) => {
                            if failure.is_some() {
                                continue;
                            }
                            match sink.write(&bytes) {
                                Ok(()) => written += bytes.len() as u64,
                                Err(e) => {
                                    error!(error = %e, "encoder rejected captured audio, ending capture");
                                    failure = Some(e);
                                    let _ = stopped_tx.send(StreamStopped {
                                        capture_id,
                                        error: None,
                                    });
                                }
                            }
                        }
                        SinkMessage::Finish => break,
                    }
                }
                let finalized = sink.finalize();
                match failure {
                    Some(e) => Err(e),
                    None => finalized.map(|()| written),
                }
            })
            .map_err(|e| PipelineError::Io(format!("failed to spawn writer thread: {}", e)))?;

        Ok(Self {
            tx,
            handle: Some(handle),
            overruns: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Non-blocking buffer handler for the audio callback
    fn buffer_handler(&self, meter: Arc<PeakMeter>) -> BufferHandler {
        let tx = self.tx.clone();
        let overruns = Arc::clone(&self.overruns);
        Box::new(move |bytes: &[u8]| {
            meter.store(peak_level(bytes));
            match tx.try_send(SinkMessage::Pcm(bytes.to_vec())) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => {
                    overruns.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    }

    /// Flush queued buffers, finalize the container and return bytes written
    fn finish(mut self) -> Result<u64, EncoderError> {
        let _ = self.tx.send(SinkMessage::Finish);
        let dropped = self.overruns.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!(dropped, "writer fell behind, buffers were dropped");
        }
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(EncoderError::FinalizeFailed("writer thread panicked".to_string()))
            }),
            None => Ok(0),
        }
    }
}

struct ActiveCapture {
    id: u64,
    session: CaptureSession,
    stream: Box<dyn LoopbackStream>,
    writer: SinkWriter,
    ledger: MuteLedger,
    stream_format: StreamFormat,
}

/// Single-slot capture pipeline
pub struct CapturePipeline {
    directory: SessionDirectory,
    mutes: MuteCoordinator,
    source: Arc<dyn LoopbackSource>,
    encoders: Arc<dyn EncoderFactory>,
    temp_dir: PathBuf,
    lifecycle: CaptureLifecycle,
    slot: Option<ActiveCapture>,
    meter: Arc<PeakMeter>,
    stopped_tx: UnboundedSender<StreamStopped>,
    next_capture_id: u64,
}

impl CapturePipeline {
    /// Create an idle pipeline.
    ///
    /// Stream completions are delivered on `stopped_tx` and must be fed
    /// back through [`CapturePipeline::on_stream_stopped`].
    pub fn new(
        mixer: Arc<dyn SessionMixer>,
        source: Arc<dyn LoopbackSource>,
        encoders: Arc<dyn EncoderFactory>,
        temp_dir: PathBuf,
        stopped_tx: UnboundedSender<StreamStopped>,
    ) -> Self {
        Self {
            directory: SessionDirectory::new(Arc::clone(&mixer)),
            mutes: MuteCoordinator::new(mixer),
            source,
            encoders,
            temp_dir,
            lifecycle: CaptureLifecycle::new(),
            slot: None,
            meter: Arc::new(PeakMeter::new()),
            stopped_tx,
            next_capture_id: 1,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.lifecycle.state()
    }

    pub fn is_capturing(&self) -> bool {
        !self.lifecycle.is_idle()
    }

    pub fn current(&self) -> Option<&CaptureSession> {
        self.slot.as_ref().map(|active| &active.session)
    }

    /// Shared peak meter, written by the audio callback
    pub fn meter(&self) -> Arc<PeakMeter> {
        Arc::clone(&self.meter)
    }

    pub fn peak_level(&self) -> f64 {
        self.meter.load()
    }

    /// Isolate `process_id` and start capturing into a temporary file.
    ///
    /// Any failure leaves the pipeline Idle with mutes restored and no
    /// partial file behind.
    pub fn start(
        &mut self,
        process_id: u32,
        format: RecordingFormat,
    ) -> Result<CaptureSession, PipelineError> {
        if self.lifecycle.begin_start().is_err() {
            return Err(PipelineError::AlreadyRecording);
        }

        match self.try_start(process_id, format) {
            Ok(session) => {
                let _ = self.lifecycle.mark_recording();
                info!(
                    pid = process_id,
                    process = %session.target_name,
                    format = %format,
                    path = %session.output_path.display(),
                    "capture started"
                );
                Ok(session)
            }
            Err(e) => {
                let _ = self.lifecycle.fault();
                warn!(pid = process_id, error = %e, "capture failed to start");
                Err(e)
            }
        }
    }

    fn try_start(
        &mut self,
        process_id: u32,
        format: RecordingFormat,
    ) -> Result<CaptureSession, PipelineError> {
        let target_name = match self.directory.process_name(process_id) {
            Some(name) => name,
            None => return Err(self.unresolved_target(process_id)),
        };
        let output_path = self.unique_temp_path(&target_name, format)?;

        let mut ledger = self.mutes.apply_isolation(process_id);
        debug!(muted = ledger.len(), "isolation applied");

        let id = self.next_capture_id;
        self.next_capture_id += 1;

        match self.open_stream(id, &output_path, format) {
            Ok((stream, writer, stream_format)) => {
                let session = CaptureSession {
                    target_process_id: process_id,
                    target_name,
                    format,
                    output_path,
                    started_at: Local::now(),
                };
                self.slot = Some(ActiveCapture {
                    id,
                    session: session.clone(),
                    stream,
                    writer,
                    ledger,
                    stream_format,
                });
                Ok(session)
            }
            Err(e) => {
                self.mutes.revert_isolation(&mut ledger);
                remove_if_exists(&output_path);
                Err(e)
            }
        }
    }

    /// The target's name could not be read: either the device is gone or
    /// the process exited
    fn unresolved_target(&self, process_id: u32) -> PipelineError {
        match self.directory.list_sessions().error {
            Some(MixerError::DeviceUnavailable(reason)) => {
                PipelineError::Capture(CaptureError::DeviceUnavailable(reason))
            }
            _ => PipelineError::ProcessVanished(process_id),
        }
    }

    fn open_stream(
        &self,
        id: u64,
        path: &Path,
        format: RecordingFormat,
    ) -> Result<(Box<dyn LoopbackStream>, SinkWriter, StreamFormat), PipelineError> {
        let stream_format = self.source.native_format()?;
        let sink = self
            .encoders
            .create(path, format, stream_format)
            .map_err(|e| PipelineError::EncoderUnavailable(e.to_string()))?;
        let writer = SinkWriter::spawn(sink, id, self.stopped_tx.clone())?;

        let on_buffer = writer.buffer_handler(Arc::clone(&self.meter));
        let stopped_tx = self.stopped_tx.clone();
        let on_stopped: StopNotifier = Box::new(move |error| {
            let _ = stopped_tx.send(StreamStopped {
                capture_id: id,
                error,
            });
        });

        match self.source.open(on_buffer, on_stopped) {
            Ok(stream) => Ok((stream, writer, stream_format)),
            Err(e) => {
                let _ = writer.finish();
                Err(e.into())
            }
        }
    }

    /// Ask the stream to halt. Teardown happens in
    /// [`CapturePipeline::on_stream_stopped`].
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        if self.lifecycle.request_stop().is_err() {
            return Err(PipelineError::NotRecording);
        }
        if let Some(active) = self.slot.as_mut() {
            info!(pid = active.session.target_process_id, "stopping capture");
            active.stream.request_stop();
        }
        Ok(())
    }

    /// Tear down after the stream reported completion.
    ///
    /// Mutes are always restored and the sink is always finalized. Returns
    /// the finished record, or `None` for a completion that does not belong
    /// to the current capture.
    pub fn on_stream_stopped(
        &mut self,
        event: StreamStopped,
    ) -> Result<Option<RecordingRecord>, PipelineError> {
        if !matches!(&self.slot, Some(active) if active.id == event.capture_id) {
            debug!(capture_id = event.capture_id, "ignoring stale stream completion");
            return Ok(None);
        }
        let Some(mut active) = self.slot.take() else {
            return Ok(None);
        };

        let restored = self.mutes.revert_isolation(&mut active.ledger);
        drop(active.stream);
        let written = active.writer.finish();
        let _ = self.lifecycle.finish();
        self.meter.reset();

        let session = active.session;
        let path = session.output_path;
        debug!(restored, path = %path.display(), "capture torn down");

        if let Some(err) = event.error {
            remove_if_exists(&path);
            return Err(err.into());
        }
        let bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_if_exists(&path);
                return Err(e.into());
            }
        };
        if !path.exists() {
            return Err(PipelineError::MissingOutputFile(path));
        }

        let frames = bytes / active.stream_format.frame_bytes() as u64;
        let duration = Duration::from_frames(frames, active.stream_format.sample_rate);
        info!(path = %path.display(), duration = %duration.as_clock(), "capture finished");

        Ok(Some(RecordingRecord::new(path, session.format, duration)))
    }

    /// Finish the current capture without waiting for the stream's own
    /// completion signal.
    pub fn force_stopped(&mut self) -> Result<Option<RecordingRecord>, PipelineError> {
        let Some(capture_id) = self.slot.as_ref().map(|active| active.id) else {
            return Ok(None);
        };
        warn!("stream did not report completion, tearing down");
        self.on_stream_stopped(StreamStopped {
            capture_id,
            error: None,
        })
    }

    fn unique_temp_path(
        &self,
        process_name: &str,
        format: RecordingFormat,
    ) -> Result<PathBuf, PipelineError> {
        std::fs::create_dir_all(&self.temp_dir)
            .map_err(|e| PipelineError::Io(format!("{}: {}", self.temp_dir.display(), e)))?;

        let candidate = self
            .temp_dir
            .join(temp_file_name(process_name, format, Local::now()));
        if !is_taken(&candidate, format) {
            return Ok(candidate);
        }

        let stem = candidate
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (1u32..=9999)
            .map(|n| {
                self.temp_dir
                    .join(format!("{}_{}.{}", stem, n, format.capture_extension()))
            })
            .find(|p| !is_taken(p, format))
            .ok_or_else(|| PipelineError::Io("no free temporary file name".to_string()))
    }
}

/// A name is taken if the capture file or its post-processed sibling exists
fn is_taken(path: &Path, format: RecordingFormat) -> bool {
    path.exists() || (format.needs_post_processing() && path.with_extension(format.extension()).exists())
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partial capture");
        }
    }
}
