//! Diagnostic counters
//!
//! Owned by whoever drives the model (normally the composition) and passed
//! where needed, rather than kept in global state.

use std::collections::HashMap;

/// Named event counters for the data model
#[derive(Debug, Clone, Default)]
pub struct Counters {
    counts: HashMap<String, u64>,
}

impl Counters {
    pub const SYNC_PASSES: &'static str = "sync_passes";
    pub const EVENTS_PROPAGATED: &'static str = "events_propagated";
    pub const SEGMENT_REFRESHES: &'static str = "segment_refreshes";
    pub const LINKERS_CREATED: &'static str = "linkers_created";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &str, amount: u64) {
        *self.counts.entry(name.to_string()).or_insert(0) += amount;
    }

    /// Zero for a counter never touched
    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}
