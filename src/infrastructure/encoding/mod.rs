//! Capture sinks
//!
//! WAV (and the FLAC intermediate) is written with hound; MP3 is streamed
//! through an ffmpeg child process.

mod factory;
mod ffmpeg_mp3;
mod wav;

pub use factory::FileEncoderFactory;
pub use ffmpeg_mp3::FfmpegMp3Sink;
pub use wav::WavSink;

use crate::domain::capture::BYTES_PER_SAMPLE;

/// Splits a byte stream into little-endian f32 samples, carrying any
/// partial sample over to the next call
#[derive(Debug, Default)]
pub(crate) struct SampleReassembler {
    carry: Vec<u8>,
}

impl SampleReassembler {
    pub(crate) fn feed(&mut self, bytes: &[u8], mut each: impl FnMut(f32)) {
        let mut rest = bytes;

        if !self.carry.is_empty() {
            let need = BYTES_PER_SAMPLE - self.carry.len();
            let take = need.min(rest.len());
            self.carry.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.carry.len() < BYTES_PER_SAMPLE {
                return;
            }
            let sample = [self.carry[0], self.carry[1], self.carry[2], self.carry[3]];
            each(f32::from_le_bytes(sample));
            self.carry.clear();
        }

        let mut chunks = rest.chunks_exact(BYTES_PER_SAMPLE);
        for chunk in &mut chunks {
            each(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        self.carry.extend_from_slice(chunks.remainder());
    }

    pub(crate) fn has_partial(&self) -> bool {
        !self.carry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn whole_samples_pass_straight_through() {
        let mut samples = Vec::new();
        SampleReassembler::default().feed(&bytes(&[0.5, -0.25]), |s| samples.push(s));
        assert_eq!(samples, vec![0.5, -0.25]);
    }

    #[test]
    fn split_sample_is_reassembled() {
        let data = bytes(&[0.5, -0.25, 1.0]);
        let mut reassembler = SampleReassembler::default();
        let mut samples = Vec::new();

        reassembler.feed(&data[..5], |s| samples.push(s));
        assert!(reassembler.has_partial());
        reassembler.feed(&data[5..6], |s| samples.push(s));
        reassembler.feed(&data[6..], |s| samples.push(s));

        assert_eq!(samples, vec![0.5, -0.25, 1.0]);
        assert!(!reassembler.has_partial());
    }
}
