//! Record of mute flags changed for a capture

use std::collections::BTreeMap;

/// Original mute flag per process, captured when isolation is applied.
///
/// A process id is inserted at most once; when a process owns several
/// sessions the first original flag seen is the one restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteLedger {
    originals: BTreeMap<u32, bool>,
}

impl MuteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `original_muted` for `process_id`.
    ///
    /// Returns false (and keeps the earlier value) if the process is
    /// already recorded.
    pub fn remember(&mut self, process_id: u32, original_muted: bool) -> bool {
        if self.originals.contains_key(&process_id) {
            return false;
        }
        self.originals.insert(process_id, original_muted);
        true
    }

    /// Original flag to restore for `process_id`, if it was recorded
    pub fn original(&self, process_id: u32) -> Option<bool> {
        self.originals.get(&process_id).copied()
    }

    pub fn contains(&self, process_id: u32) -> bool {
        self.originals.contains_key(&process_id)
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn process_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.originals.keys().copied()
    }

    pub fn clear(&mut self) {
        self.originals.clear();
    }
}
