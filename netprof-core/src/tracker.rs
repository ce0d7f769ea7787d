//! Deduplicating rollups keyed by name.
//!
//! A [`UniqueItemTracker`] folds every occurrence of a key into one
//! [`ItemRollup`]. Each entry can carry a nested detail value, which is how
//! per-class entries hold their own per-property tracker.

use std::collections::HashMap;
use std::hash::Hash;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position of a token inside a capture: frame index and token index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TokenRef {
    pub frame: usize,
    pub token: usize,
}

impl TokenRef {
    /// Creates a new token reference.
    pub fn new(frame: usize, token: usize) -> Self {
        Self { frame, token }
    }
}

/// Values that can absorb another instance of themselves.
///
/// Merging must be associative so partial results can be combined in any
/// grouping.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl Merge for () {
    fn merge(&mut self, _other: Self) {}
}

/// Running totals for one tracked key.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ItemRollup {
    pub count: u64,
    pub size_bits: u64,
    pub time_ms: f64,
    /// Occurrences that replicated at least one property.
    pub replicated_count: u64,
    /// Earliest occurrence seen.
    pub first_seen: Option<TokenRef>,
}

impl ItemRollup {
    /// Records one occurrence.
    pub fn record(&mut self, size_bits: u64, time_ms: f64, replicated: bool, seen_at: Option<TokenRef>) {
        self.count += 1;
        self.size_bits += size_bits;
        self.time_ms += time_ms;
        if replicated {
            self.replicated_count += 1;
        }
        self.first_seen = earliest(self.first_seen, seen_at);
    }
}

impl Merge for ItemRollup {
    fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.size_bits += other.size_bits;
        self.time_ms += other.time_ms;
        self.replicated_count += other.replicated_count;
        self.first_seen = earliest(self.first_seen, other.first_seen);
    }
}

fn earliest(a: Option<TokenRef>, b: Option<TokenRef>) -> Option<TokenRef> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// One tracker entry: the rollup plus an optional nested detail.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackedItem<D = ()> {
    pub rollup: ItemRollup,
    pub detail: D,
}

/// Map from key to rollup, deduplicating repeated occurrences.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniqueItemTracker<K: Eq + Hash, D = ()> {
    items: HashMap<K, TrackedItem<D>>,
}

impl<K: Eq + Hash, D> Default for UniqueItemTracker<K, D> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<K, D> UniqueItemTracker<K, D>
where
    K: Eq + Hash + Copy + Ord,
    D: Default,
{
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `key` and returns its entry so the caller
    /// can update the nested detail.
    pub fn record(
        &mut self,
        key: K,
        size_bits: u64,
        time_ms: f64,
        replicated: bool,
        seen_at: Option<TokenRef>,
    ) -> &mut TrackedItem<D> {
        let item = self.items.entry(key).or_default();
        item.rollup.record(size_bits, time_ms, replicated, seen_at);
        item
    }

    /// Returns the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&TrackedItem<D>> {
        self.items.get(key)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &TrackedItem<D>)> {
        self.items.iter()
    }

    /// Sum of all occurrence counts.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.items.values().map(|item| item.rollup.count).sum()
    }

    /// Sum of all sizes.
    #[must_use]
    pub fn total_size_bits(&self) -> u64 {
        self.items.values().map(|item| item.rollup.size_bits).sum()
    }

    /// Entries sorted by total size, largest first. Ties sort by key.
    #[must_use]
    pub fn sorted_by_size(&self) -> Vec<(K, &TrackedItem<D>)> {
        let mut sorted: Vec<_> = self.items.iter().map(|(k, v)| (*k, v)).collect();
        sorted.sort_by(|a, b| {
            b.1.rollup
                .size_bits
                .cmp(&a.1.rollup.size_bits)
                .then(a.0.cmp(&b.0))
        });
        sorted
    }

    /// Entries sorted by occurrence count, largest first. Ties sort by key.
    #[must_use]
    pub fn sorted_by_count(&self) -> Vec<(K, &TrackedItem<D>)> {
        let mut sorted: Vec<_> = self.items.iter().map(|(k, v)| (*k, v)).collect();
        sorted.sort_by(|a, b| b.1.rollup.count.cmp(&a.1.rollup.count).then(a.0.cmp(&b.0)));
        sorted
    }
}

impl<K, D> Merge for UniqueItemTracker<K, D>
where
    K: Eq + Hash,
    D: Merge,
{
    fn merge(&mut self, other: Self) {
        for (key, item) in other.items {
            match self.items.get_mut(&key) {
                Some(existing) => {
                    existing.rollup.merge(item.rollup);
                    existing.detail.merge(item.detail);
                }
                None => {
                    self.items.insert(key, item);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_dedups_by_key() {
        let mut tracker: UniqueItemTracker<u32> = UniqueItemTracker::new();
        tracker.record(7, 100, 1.0, true, Some(TokenRef::new(0, 3)));
        tracker.record(7, 50, 0.5, false, Some(TokenRef::new(2, 0)));
        tracker.record(8, 10, 0.0, false, None);

        assert_eq!(tracker.len(), 2);
        let item = tracker.get(&7).unwrap();
        assert_eq!(item.rollup.count, 2);
        assert_eq!(item.rollup.size_bits, 150);
        assert_eq!(item.rollup.replicated_count, 1);
        assert_eq!(item.rollup.first_seen, Some(TokenRef::new(0, 3)));
        assert_eq!(tracker.total_count(), 3);
        assert_eq!(tracker.total_size_bits(), 160);
    }

    #[test]
    fn test_nested_tracker_merge() {
        type ClassTracker = UniqueItemTracker<u32, UniqueItemTracker<u32>>;

        let mut left = ClassTracker::new();
        left.record(1, 40, 0.2, true, Some(TokenRef::new(5, 1)))
            .detail
            .record(10, 40, 0.0, true, Some(TokenRef::new(5, 1)));

        let mut right = ClassTracker::new();
        right
            .record(1, 60, 0.3, true, Some(TokenRef::new(1, 0)))
            .detail
            .record(11, 60, 0.0, true, Some(TokenRef::new(1, 0)));
        right.record(2, 5, 0.0, false, None);

        left.merge(right);

        assert_eq!(left.len(), 2);
        let class = left.get(&1).unwrap();
        assert_eq!(class.rollup.count, 2);
        assert_eq!(class.rollup.size_bits, 100);
        assert_eq!(class.rollup.first_seen, Some(TokenRef::new(1, 0)));
        assert_eq!(class.detail.len(), 2);
    }

    #[test]
    fn test_sorted_views() {
        let mut tracker: UniqueItemTracker<u32> = UniqueItemTracker::new();
        tracker.record(1, 10, 0.0, false, None);
        tracker.record(2, 30, 0.0, false, None);
        tracker.record(3, 10, 0.0, false, None);
        tracker.record(3, 10, 0.0, false, None);

        let by_size: Vec<u32> = tracker.sorted_by_size().iter().map(|(k, _)| *k).collect();
        assert_eq!(by_size, vec![2, 3, 1]);

        let by_count: Vec<u32> = tracker.sorted_by_count().iter().map(|(k, _)| *k).collect();
        assert_eq!(by_count, vec![3, 1, 2]);
    }
}
