//! Filtered copies of frames.
//!
//! Filtering never touches the source frame. The copy holds only passing
//! tokens, and actors keep only their passing properties and headers, so
//! aggregating the copy with an empty filter gives the same counters as
//! aggregating the source with the filter.

use netprof_core::filter::FilterSpec;
use netprof_core::frame::Frame;
use netprof_core::names::NameTable;
use netprof_core::token::{ReplicateActor, Token};

use crate::accumulate::frame_stats;

/// Copies an actor, keeping only properties and headers that pass.
#[must_use]
pub fn filter_actor(actor: &ReplicateActor, filter: &FilterSpec, names: &NameTable) -> ReplicateActor {
    ReplicateActor {
        properties: actor
            .properties
            .iter()
            .filter(|p| filter.property_passes(p, names))
            .copied()
            .collect(),
        property_headers: actor
            .property_headers
            .iter()
            .filter(|h| filter.property_passes(h, names))
            .copied()
            .collect(),
        ..*actor
    }
}

/// Builds a new frame holding the tokens of `frame` that pass `filter`.
#[must_use]
pub fn filter_frame(frame: &Frame, filter: &FilterSpec, names: &NameTable) -> Frame {
    let tokens: Vec<Token> = frame
        .tokens
        .iter()
        .filter(|token| filter.token_passes(token, names))
        .map(|token| match token {
            Token::ReplicateActor(actor) => Token::ReplicateActor(filter_actor(actor, filter, names)),
            other => other.clone(),
        })
        .collect();

    let stats = frame_stats(&tokens, &FilterSpec::new(), names);
    Frame {
        start_time: frame.start_time,
        end_time: frame.end_time,
        delta_time: frame.delta_time,
        tokens,
        stats,
    }
}
