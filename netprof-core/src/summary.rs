//! Per-name summaries accumulated over a whole capture.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Occurrence count, size and time for one name.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    pub count: u64,
    pub size_bits: u64,
    pub time_ms: f64,
}

impl Summary {
    /// Records one occurrence.
    pub fn record(&mut self, size_bits: u64, time_ms: f64) {
        self.count += 1;
        self.size_bits += size_bits;
        self.time_ms += time_ms;
    }
}

/// Summaries keyed by name table index.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SummaryMap {
    entries: HashMap<u32, Summary>,
}

impl SummaryMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence under `name_index`.
    pub fn record(&mut self, name_index: u32, size_bits: u64, time_ms: f64) {
        self.entries
            .entry(name_index)
            .or_default()
            .record(size_bits, time_ms);
    }

    /// Returns the summary for `name_index`.
    #[must_use]
    pub fn get(&self, name_index: u32) -> Option<&Summary> {
        self.entries.get(&name_index)
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Summary)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Entries sorted by total size, largest first. Ties sort by index.
    #[must_use]
    pub fn sorted_by_size(&self) -> Vec<(u32, &Summary)> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by(|a, b| b.1.size_bits.cmp(&a.1.size_bits).then(a.0.cmp(&b.0)));
        sorted
    }
}
