//! Device loopback capture port

use thiserror::Error;

/// Capture stream errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("No output device available for loopback: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to start loopback stream: {0}")]
    StartFailed(String),

    #[error("Loopback stream failed: {0}")]
    StreamFailed(String),
}

/// Native format of the loopback stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    /// Bytes in one interleaved f32 frame
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels.max(1)) * crate::domain::capture::BYTES_PER_SAMPLE
    }
}

/// Receives each hardware buffer as interleaved little-endian f32 bytes.
/// Runs on the audio callback thread.
pub type BufferHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Called exactly once when a stream that opened successfully has stopped,
/// with the error that stopped it if any.
pub type StopNotifier = Box<dyn FnOnce(Option<CaptureError>) + Send + 'static>;

/// A running loopback stream
pub trait LoopbackStream: Send {
    /// Ask the stream to halt. Completion is reported through the
    /// [`StopNotifier`] given to [`LoopbackSource::open`].
    fn request_stop(&mut self);
}

/// Port for loopback capture of the default render device
pub trait LoopbackSource: Send + Sync {
    /// Format buffers will arrive in
    fn native_format(&self) -> Result<StreamFormat, CaptureError>;

    /// Open the stream and begin delivering buffers.
    ///
    /// On error neither callback is ever invoked.
    fn open(
        &self,
        on_buffer: BufferHandler,
        on_stopped: StopNotifier,
    ) -> Result<Box<dyn LoopbackStream>, CaptureError>;
}
