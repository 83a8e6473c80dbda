//! Hand-written fakes for the application ports

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::ports::{
    BufferHandler, CaptureError, EncoderError, EncoderFactory, EncoderSink, LoopbackSource,
    LoopbackStream, MixerError, MixerSession, RecordStore, SessionMixer, StopNotifier,
    StoreError, StreamFormat, TranscodeError, TranscodeRequest, Transcoder,
};
use crate::domain::recording::{RecordingFormat, RecordingRecord};
use crate::domain::session::SessionState;

#[derive(Default)]
struct MixerState {
    sessions: Vec<MixerSession>,
    muted: HashMap<String, bool>,
    names: HashMap<u32, String>,
    enumeration_error: Option<MixerError>,
    failing_mutes: HashSet<String>,
}

/// In-memory mixer
#[derive(Default)]
pub struct FakeMixer {
    state: Mutex<MixerState>,
}

impl FakeMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(
        self,
        id: &str,
        process_id: u32,
        name: &str,
        state: SessionState,
        muted: bool,
    ) -> Self {
        {
            let mut inner = self.state.lock().unwrap();
            inner.sessions.push(MixerSession::new(id, process_id, state));
            inner.muted.insert(id.to_string(), muted);
            inner.names.insert(process_id, name.to_string());
        }
        self
    }

    /// Register a process that exists but owns no session
    pub fn with_process(self, process_id: u32, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .names
            .insert(process_id, name.to_string());
        self
    }

    pub fn muted(&self, id: &str) -> bool {
        self.state.lock().unwrap().muted.get(id).copied().unwrap_or(false)
    }

    pub fn set_state(&self, process_id: u32, state: SessionState) {
        let mut inner = self.state.lock().unwrap();
        for session in inner.sessions.iter_mut() {
            if session.process_id == process_id {
                session.state = state;
            }
        }
    }

    /// External software flipping a mute flag
    pub fn set_muted_externally(&self, id: &str, muted: bool) {
        self.state.lock().unwrap().muted.insert(id.to_string(), muted);
    }

    pub fn forget_process(&self, process_id: u32) {
        self.state.lock().unwrap().names.remove(&process_id);
    }

    pub fn fail_enumeration(&self, error: MixerError) {
        self.state.lock().unwrap().enumeration_error = Some(error);
    }

    pub fn restore_enumeration(&self) {
        self.state.lock().unwrap().enumeration_error = None;
    }

    pub fn fail_mute(&self, id: &str) {
        self.state.lock().unwrap().failing_mutes.insert(id.to_string());
    }
}

impl SessionMixer for FakeMixer {
    fn sessions(&self) -> Result<Vec<MixerSession>, MixerError> {
        let inner = self.state.lock().unwrap();
        match &inner.enumeration_error {
            Some(err) => Err(err.clone()),
            None => Ok(inner.sessions.clone()),
        }
    }

    fn is_muted(&self, session_id: &str) -> Result<bool, MixerError> {
        let inner = self.state.lock().unwrap();
        if inner.failing_mutes.contains(session_id) {
            return Err(MixerError::SessionGone(session_id.to_string()));
        }
        inner
            .muted
            .get(session_id)
            .copied()
            .ok_or_else(|| MixerError::SessionGone(session_id.to_string()))
    }

    fn set_muted(&self, session_id: &str, muted: bool) -> Result<(), MixerError> {
        let mut inner = self.state.lock().unwrap();
        if inner.failing_mutes.contains(session_id) {
            return Err(MixerError::SessionGone(session_id.to_string()));
        }
        inner.muted.insert(session_id.to_string(), muted);
        Ok(())
    }

    fn process_name(&self, process_id: u32) -> Option<String> {
        self.state.lock().unwrap().names.get(&process_id).cloned()
    }
}

#[derive(Default)]
struct LoopbackState {
    on_buffer: Option<BufferHandler>,
    on_stopped: Option<StopNotifier>,
    open_error: Option<CaptureError>,
    opened: usize,
    stop_requests: usize,
    complete_on_stop: bool,
}

/// Loopback source driven by the test
#[derive(Clone, Default)]
pub struct FakeLoopback {
    state: Arc<Mutex<LoopbackState>>,
}

pub const FAKE_FORMAT: StreamFormat = StreamFormat {
    sample_rate: 48_000,
    channels: 2,
};

impl FakeLoopback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report completion as soon as a stop is requested
    pub fn auto_complete(self) -> Self {
        self.state.lock().unwrap().complete_on_stop = true;
        self
    }

    pub fn fail_open(&self, error: CaptureError) {
        self.state.lock().unwrap().open_error = Some(error);
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn stop_requests(&self) -> usize {
        self.state.lock().unwrap().stop_requests
    }

    /// Deliver one buffer as the audio thread would
    pub fn push(&self, samples: &[f32]) {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut inner = self.state.lock().unwrap();
        if let Some(handler) = inner.on_buffer.as_mut() {
            handler(&bytes);
        }
    }

    /// Report the stream as stopped
    pub fn finish(&self, error: Option<CaptureError>) {
        let notifier = {
            let mut inner = self.state.lock().unwrap();
            inner.on_buffer = None;
            inner.on_stopped.take()
        };
        if let Some(notify) = notifier {
            notify(error);
        }
    }
}

struct FakeStream {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackStream for FakeStream {
    fn request_stop(&mut self) {
        let notifier = {
            let mut inner = self.state.lock().unwrap();
            inner.stop_requests += 1;
            if inner.complete_on_stop {
                inner.on_buffer = None;
                inner.on_stopped.take()
            } else {
                None
            }
        };
        if let Some(notify) = notifier {
            notify(None);
        }
    }
}

impl LoopbackSource for FakeLoopback {
    fn native_format(&self) -> Result<StreamFormat, CaptureError> {
        Ok(FAKE_FORMAT)
    }

    fn open(
        &self,
        on_buffer: BufferHandler,
        on_stopped: StopNotifier,
    ) -> Result<Box<dyn LoopbackStream>, CaptureError> {
        let mut inner = self.state.lock().unwrap();
        if let Some(err) = inner.open_error.clone() {
            return Err(err);
        }
        inner.on_buffer = Some(on_buffer);
        inner.on_stopped = Some(on_stopped);
        inner.opened += 1;
        Ok(Box::new(FakeStream {
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Default)]
struct EncoderLog {
    created: Vec<(PathBuf, RecordingFormat)>,
    unavailable: Option<String>,
    write_failure: Option<String>,
    skip_file: bool,
}

/// Encoder factory writing raw bytes to the target path
#[derive(Clone, Default)]
pub struct FakeEncoders {
    log: Arc<Mutex<EncoderLog>>,
}

impl FakeEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_unavailable(&self, reason: &str) {
        self.log.lock().unwrap().unavailable = Some(reason.to_string());
    }

    /// Sinks reject every buffer, like an encoder process that died
    pub fn fail_writes(&self, reason: &str) {
        self.log.lock().unwrap().write_failure = Some(reason.to_string());
    }

    /// Sinks accept data but never leave a file behind
    pub fn skip_file(&self) {
        self.log.lock().unwrap().skip_file = true;
    }

    pub fn created(&self) -> Vec<(PathBuf, RecordingFormat)> {
        self.log.lock().unwrap().created.clone()
    }
}

struct FileSink {
    path: PathBuf,
    data: Vec<u8>,
    write_failure: Option<String>,
    skip_file: bool,
}

impl EncoderSink for FileSink {
    fn write(&mut self, pcm: &[u8]) -> Result<(), EncoderError> {
        if let Some(reason) = &self.write_failure {
            return Err(EncoderError::WriteFailed(reason.clone()));
        }
        self.data.extend_from_slice(pcm);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), EncoderError> {
        if self.skip_file {
            let _ = std::fs::remove_file(&self.path);
            return Ok(());
        }
        std::fs::write(&self.path, &self.data)
            .map_err(|e| EncoderError::FinalizeFailed(e.to_string()))
    }
}

impl EncoderFactory for FakeEncoders {
    fn create(
        &self,
        path: &Path,
        format: RecordingFormat,
        _stream: StreamFormat,
    ) -> Result<Box<dyn EncoderSink>, EncoderError> {
        let mut log = self.log.lock().unwrap();
        if let Some(reason) = &log.unavailable {
            return Err(EncoderError::Unavailable(reason.clone()));
        }
        log.created.push((path.to_path_buf(), format));
        std::fs::write(path, b"").map_err(|e| EncoderError::Unavailable(e.to_string()))?;
        Ok(Box::new(FileSink {
            path: path.to_path_buf(),
            data: Vec::new(),
            write_failure: log.write_failure.clone(),
            skip_file: log.skip_file,
        }))
    }
}

/// How the fake converter behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscoderMode {
    /// Copy input bytes to output
    Succeed,
    Missing,
    Fail(String),
    /// Exit 0 without writing output
    NoOutput,
}

/// Converter that copies files instead of encoding
#[derive(Clone)]
pub struct FakeTranscoder {
    mode: Arc<Mutex<TranscoderMode>>,
    requests: Arc<Mutex<Vec<TranscodeRequest>>>,
}

impl FakeTranscoder {
    pub fn new(mode: TranscoderMode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_mode(&self, mode: TranscoderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn requests(&self) -> Vec<TranscodeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), TranscodeError> {
        self.requests.lock().unwrap().push(request.clone());
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            TranscoderMode::Succeed => {
                std::fs::copy(&request.input, &request.output)
                    .map_err(|e| TranscodeError::Io(e.to_string()))?;
                Ok(())
            }
            TranscoderMode::Missing => Err(TranscodeError::ToolMissing("ffmpeg".to_string())),
            TranscoderMode::Fail(diagnostic) => Err(TranscodeError::Failed {
                code: Some(1),
                diagnostic,
            }),
            TranscoderMode::NoOutput => Ok(()),
        }
    }
}

/// Record store kept in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Option<Vec<RecordingRecord>>>>,
    corrupt: Arc<Mutex<bool>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RecordingRecord>) -> Self {
        let store = Self::default();
        *store.records.lock().unwrap() = Some(records);
        store
    }

    pub fn corrupt() -> Self {
        let store = Self::default();
        *store.corrupt.lock().unwrap() = true;
        store
    }

    pub fn stored(&self) -> Vec<RecordingRecord> {
        self.records.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self) -> Result<Vec<RecordingRecord>, StoreError> {
        if *self.corrupt.lock().unwrap() {
            return Err(StoreError::Corrupt("expected value at line 1".to_string()));
        }
        Ok(self.stored())
    }

    async fn save(&self, records: &[RecordingRecord]) -> Result<(), StoreError> {
        *self.records.lock().unwrap() = Some(records.to_vec());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }

    fn path(&self) -> PathBuf {
        PathBuf::from("memory://history")
    }
}
