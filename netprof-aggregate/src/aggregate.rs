//! Frame and frame-range aggregation.

use std::sync::atomic::{AtomicBool, Ordering};

use netprof_core::filter::FilterSpec;
use netprof_core::frame::Frame;
use netprof_core::names::NameTable;
use netprof_core::stats::FrameStats;
use netprof_core::token::{ReplicateActor, Token};
use netprof_core::tracker::{Merge, TokenRef, UniqueItemTracker};
use rayon::prelude::*;

use crate::accumulate::accumulate_token;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-property rollup keyed by property name index.
pub type PropertyTracker = UniqueItemTracker<u32>;

/// Per-class rollup keyed by class name index, each holding its properties.
pub type ClassTracker = UniqueItemTracker<u32, PropertyTracker>;

/// Per-RPC rollup keyed by function name index.
pub type RpcTracker = UniqueItemTracker<u32>;

/// Counters and rollups over an ordered set of tokens.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aggregate {
    /// Category counters.
    pub stats: FrameStats,
    /// Start of the first aggregated frame, in seconds.
    pub start_time: f32,
    /// End of the last aggregated frame, in seconds.
    pub end_time: f32,
    /// Actor rollup keyed by derived class name index.
    pub actor_classes: ClassTracker,
    /// RPC rollup keyed by function name index.
    pub rpcs: RpcTracker,
}

impl Aggregate {
    /// Creates an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Covered time span in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.end_time - self.start_time
    }

    /// Rate of `value` per second over the covered span.
    ///
    /// Returns `None` for zero-length spans.
    #[must_use]
    pub fn per_second(&self, value: f64) -> Option<f64> {
        let duration = f64::from(self.duration());
        if duration > 0.0 {
            Some(value / duration)
        } else {
            None
        }
    }

    /// Property breakdown for one actor class.
    #[must_use]
    pub fn class_properties(&self, class_name_index: u32) -> Option<&PropertyTracker> {
        self.actor_classes
            .get(&class_name_index)
            .map(|item| &item.detail)
    }

    /// Adds one frame, counting it even if none of its tokens pass.
    pub fn add_frame(
        &mut self,
        frame: &Frame,
        frame_index: usize,
        filter: &FilterSpec,
        names: &NameTable,
    ) {
        let mut local = Aggregate {
            stats: FrameStats {
                frame_count: 1,
                ..FrameStats::default()
            },
            start_time: frame.start_time,
            end_time: frame.end_time,
            ..Aggregate::default()
        };
        for (token_index, token) in frame.tokens.iter().enumerate() {
            local.add_token(token, TokenRef::new(frame_index, token_index), filter, names);
        }
        self.merge(local);
    }

    /// Adds one token if it passes `filter`.
    pub fn add_token(&mut self, token: &Token, at: TokenRef, filter: &FilterSpec, names: &NameTable) {
        if !accumulate_token(&mut self.stats, token, filter, names) {
            return;
        }

        match token {
            Token::ReplicateActor(actor) => self.add_actor(actor, at, filter, names),
            Token::SendRpc(rpc) => {
                self.rpcs
                    .record(rpc.function_name_index, rpc.size_bits(), 0.0, false, Some(at));
            }
            _ => {}
        }
    }

    fn add_actor(
        &mut self,
        actor: &ReplicateActor,
        at: TokenRef,
        filter: &FilterSpec,
        names: &NameTable,
    ) {
        let passing: Vec<_> = actor
            .properties
            .iter()
            .filter(|p| filter.property_passes(p, names))
            .collect();
        let header_bits: u64 = actor
            .property_headers
            .iter()
            .filter(|h| filter.property_passes(h, names))
            .map(|h| u64::from(h.size_bits))
            .sum();
        let property_bits: u64 = passing.iter().map(|p| u64::from(p.size_bits)).sum();

        let class = self.actor_classes.record(
            actor.class_name_index,
            property_bits + header_bits,
            f64::from(actor.time_ms),
            !passing.is_empty(),
            Some(at),
        );
        for property in passing {
            class.detail.record(
                property.property_name_index,
                u64::from(property.size_bits),
                0.0,
                true,
                Some(at),
            );
        }
    }
}

impl Merge for Aggregate {
    fn merge(&mut self, other: Self) {
        if other.stats.frame_count > 0 {
            if self.stats.frame_count == 0 {
                self.start_time = other.start_time;
                self.end_time = other.end_time;
            } else {
                self.start_time = self.start_time.min(other.start_time);
                self.end_time = self.end_time.max(other.end_time);
            }
        }
        self.stats.merge(&other.stats);
        self.actor_classes.merge(other.actor_classes);
        self.rpcs.merge(other.rpcs);
    }
}

/// Configuration for range aggregation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AggregateConfig {
    /// Whether to fold frames in parallel.
    pub parallel: bool,
    /// Ranges shorter than this are folded sequentially.
    pub min_parallel_frames: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_frames: 256,
        }
    }
}

impl AggregateConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to fold frames in parallel.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the minimum range length for parallel folding.
    #[must_use]
    pub fn with_min_parallel_frames(mut self, frames: usize) -> Self {
        self.min_parallel_frames = frames;
        self
    }
}

/// Aggregates frames of one capture.
#[derive(Debug, Clone)]
pub struct Aggregator<'a> {
    names: &'a NameTable,
    config: AggregateConfig,
}

impl<'a> Aggregator<'a> {
    /// Creates an aggregator with default configuration.
    pub fn new(names: &'a NameTable) -> Self {
        Self {
            names,
            config: AggregateConfig::default(),
        }
    }

    /// Creates an aggregator with the given configuration.
    pub fn with_config(names: &'a NameTable, config: AggregateConfig) -> Self {
        Self { names, config }
    }

    /// Aggregates `frames`, whose first element has index `first_frame`
    /// in the capture.
    #[must_use]
    pub fn aggregate_frames(&self, frames: &[Frame], first_frame: usize, filter: &FilterSpec) -> Aggregate {
        let never = AtomicBool::new(false);
        self.fold(frames, first_frame, filter, &never)
            .unwrap_or_default()
    }

    /// Like [`Aggregator::aggregate_frames`], polling `cancel` once per frame.
    ///
    /// Returns `None` if `cancel` was set before the fold finished.
    #[must_use]
    pub fn aggregate_frames_cancellable(
        &self,
        frames: &[Frame],
        first_frame: usize,
        filter: &FilterSpec,
        cancel: &AtomicBool,
    ) -> Option<Aggregate> {
        self.fold(frames, first_frame, filter, cancel)
    }

    /// Aggregates a single token, for interactive selection.
    #[must_use]
    pub fn aggregate_token(&self, token: &Token, at: TokenRef, filter: &FilterSpec) -> Aggregate {
        let mut aggregate = Aggregate::new();
        aggregate.add_token(token, at, filter, self.names);
        aggregate
    }

    fn fold(
        &self,
        frames: &[Frame],
        first_frame: usize,
        filter: &FilterSpec,
        cancel: &AtomicBool,
    ) -> Option<Aggregate> {
        let names = self.names;

        let aggregate = if self.config.parallel && frames.len() >= self.config.min_parallel_frames {
            frames
                .par_iter()
                .enumerate()
                .fold(Aggregate::default, |mut acc, (i, frame)| {
                    if !cancel.load(Ordering::Relaxed) {
                        acc.add_frame(frame, first_frame + i, filter, names);
                    }
                    acc
                })
                .reduce(Aggregate::default, |mut a, b| {
                    a.merge(b);
                    a
                })
        } else {
            let mut acc = Aggregate::default();
            for (i, frame) in frames.iter().enumerate() {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                acc.add_frame(frame, first_frame + i, filter, names);
            }
            acc
        };

        if cancel.load(Ordering::Relaxed) {
            None
        } else {
            Some(aggregate)
        }
    }
}
