//! Peak level metering for interleaved 32-bit float PCM

use std::sync::atomic::{AtomicU32, Ordering};

/// Bytes per sample in the loopback stream (f32)
pub const BYTES_PER_SAMPLE: usize = 4;

/// Peak level of a buffer of little-endian f32 samples, as 0-100.
///
/// A trailing partial sample is ignored. Non-finite samples are skipped.
pub fn peak_level(buffer: &[u8]) -> f64 {
    let max = buffer
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]).abs())
        .filter(|s| s.is_finite())
        .fold(0.0f32, f32::max);

    clamp_level(f64::from(max) * 100.0)
}

/// Clamp a level into the 0-100 display range
pub fn clamp_level(level: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, 100.0)
}

/// Latest peak level, written from the audio callback and read elsewhere.
///
/// Stores the f64 level rounded to f32 bits so a store is one atomic op.
#[derive(Debug, Default)]
pub struct PeakMeter {
    bits: AtomicU32,
}

impl PeakMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, level: f64) {
        let level = clamp_level(level) as f32;
        self.bits.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f64 {
        f64::from(f32::from_bits(self.bits.load(Ordering::Relaxed)))
    }

    pub fn reset(&self) {
        self.store(0.0);
    }
}
