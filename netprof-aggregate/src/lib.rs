//! netprof-aggregate: Aggregation engine for replication captures.
//!
//! This crate turns ordered token collections into counters and rollups:
//! - **Token accumulation** - per-category counters for one token
//! - **Frame and range aggregation** - counters plus per-class,
//!   per-property and per-RPC rollups, optionally folded in parallel
//! - **Filtered copies** - new frames holding only passing tokens
//!
#![warn(missing_docs)]

mod accumulate;
mod aggregate;
mod filtered;

pub use accumulate::{accumulate_token, frame_stats};
pub use aggregate::{Aggregate, AggregateConfig, Aggregator, ClassTracker, PropertyTracker, RpcTracker};
pub use filtered::{filter_actor, filter_frame};

// Re-export core filter and rollup types
pub use netprof_core::filter::FilterSpec;
pub use netprof_core::tracker::{ItemRollup, Merge, TokenRef, TrackedItem, UniqueItemTracker};
