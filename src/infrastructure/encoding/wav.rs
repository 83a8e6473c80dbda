//! WAV capture sink (hound)

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::SampleReassembler;
use crate::application::ports::{EncoderError, EncoderSink, StreamFormat};

/// Writes the loopback stream as 32-bit float WAV, unchanged
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    reassembler: SampleReassembler,
}

impl WavSink {
    pub fn create(path: &Path, stream: StreamFormat) -> Result<Self, EncoderError> {
        let spec = WavSpec {
            channels: stream.channels,
            sample_rate: stream.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec)
            .map_err(|e| EncoderError::Unavailable(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            writer,
            reassembler: SampleReassembler::default(),
        })
    }
}

impl EncoderSink for WavSink {
    fn write(&mut self, pcm: &[u8]) -> Result<(), EncoderError> {
        let writer = &mut self.writer;
        let mut failure = None;
        self.reassembler.feed(pcm, |sample| {
            if failure.is_none() {
                if let Err(e) = writer.write_sample(sample) {
                    failure = Some(e);
                }
            }
        });
        match failure {
            Some(e) => Err(EncoderError::WriteFailed(e.to_string())),
            None => Ok(()),
        }
    }

    fn finalize(self: Box<Self>) -> Result<(), EncoderError> {
        self.writer
            .finalize()
            .map_err(|e| EncoderError::FinalizeFailed(e.to_string()))
    }
}
