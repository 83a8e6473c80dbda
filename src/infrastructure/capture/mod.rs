//! Loopback capture adapters

mod cpal_loopback;

pub use cpal_loopback::CpalLoopback;
