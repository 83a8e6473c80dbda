//! Recording history persistence

mod json;

pub use json::JsonRecordStore;
