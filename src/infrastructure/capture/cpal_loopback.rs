//! Loopback capture of the default render device using cpal
//!
//! On Windows, building an input stream on an output device opens it in
//! WASAPI loopback mode. The stream lives on its own thread because
//! `cpal::Stream` is not `Send`.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tracing::{debug, error, warn};

use crate::application::ports::{
    BufferHandler, CaptureError, LoopbackSource, LoopbackStream, StopNotifier, StreamFormat,
};

enum Control {
    Stop,
    Failed(String),
}

/// Loopback source for the system's default output device
#[derive(Debug, Default)]
pub struct CpalLoopback;

impl CpalLoopback {
    pub fn new() -> Self {
        Self
    }

    fn output_device() -> Result<cpal::Device, CaptureError> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default output device".into()))
    }

    fn output_config(
        device: &cpal::Device,
    ) -> Result<(StreamConfig, SampleFormat), CaptureError> {
        let supported = device
            .default_output_config()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        let sample_format = supported.sample_format();
        Ok((supported.into(), sample_format))
    }

    /// Build and start the stream, then park until told to stop
    fn run_stream(
        on_buffer: BufferHandler,
        on_stopped: StopNotifier,
        control_tx: Sender<Control>,
        control_rx: Receiver<Control>,
        ready: Sender<Result<(), CaptureError>>,
    ) {
        let stream = match Self::build_stream(on_buffer, control_tx) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        if let Err(e) = stream.play() {
            let _ = ready.send(Err(CaptureError::StartFailed(e.to_string())));
            return;
        }
        let _ = ready.send(Ok(()));
        debug!("loopback stream running");

        let error = match control_rx.recv() {
            Ok(Control::Failed(message)) => Some(CaptureError::StreamFailed(message)),
            Ok(Control::Stop) | Err(_) => None,
        };

        drop(stream);
        debug!(failed = error.is_some(), "loopback stream stopped");
        on_stopped(error);
    }

    fn build_stream(
        on_buffer: BufferHandler,
        control_tx: Sender<Control>,
    ) -> Result<cpal::Stream, CaptureError> {
        let device = Self::output_device()?;
        let (config, sample_format) = Self::output_config(&device)?;

        let mut handler = on_buffer;
        let mut bytes: Vec<u8> = Vec::new();
        let on_error = move |err: cpal::StreamError| {
            error!(error = %err, "loopback stream error");
            let _ = control_tx.send(Control::Failed(err.to_string()));
        };

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    encode_f32(data, &mut bytes);
                    handler(&bytes);
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    encode_i16(data, &mut bytes);
                    handler(&bytes);
                },
                on_error,
                None,
            ),
            other => {
                return Err(CaptureError::StartFailed(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };

        stream.map_err(|e| CaptureError::StartFailed(e.to_string()))
    }
}

impl LoopbackSource for CpalLoopback {
    fn native_format(&self) -> Result<StreamFormat, CaptureError> {
        let device = Self::output_device()?;
        let (config, _) = Self::output_config(&device)?;
        Ok(StreamFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        })
    }

    fn open(
        &self,
        on_buffer: BufferHandler,
        on_stopped: StopNotifier,
    ) -> Result<Box<dyn LoopbackStream>, CaptureError> {
        let (control_tx, control_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let error_tx = control_tx.clone();

        thread::Builder::new()
            .name("isocap-loopback".into())
            .spawn(move || Self::run_stream(on_buffer, on_stopped, error_tx, control_rx, ready_tx))
            .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                control: control_tx,
            })),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::StartFailed(
                "capture thread exited during start".into(),
            )),
        }
    }
}

/// Handle to a running loopback stream
struct CpalStream {
    control: Sender<Control>,
}

impl LoopbackStream for CpalStream {
    fn request_stop(&mut self) {
        if self.control.send(Control::Stop).is_err() {
            warn!("loopback stream already gone");
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        // The stream's error callback holds a sender too, so the capture
        // thread never sees a disconnect on its own.
        let _ = self.control.send(Control::Stop);
    }
}

/// Little-endian bytes of float samples, reusing `out`
fn encode_f32(samples: &[f32], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * 4);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

/// Integer samples scaled to float, as little-endian bytes
fn encode_i16(samples: &[i16], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * 4);
    for &sample in samples {
        let value = f32::from(sample) / 32768.0;
        out.extend_from_slice(&value.to_le_bytes());
    }
}
