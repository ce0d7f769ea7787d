//! Stream assembler.
//!
//! Builds frames from the decoded token stream in two passes:
//!
//! 1. **Scanning**: decode tokens until end-of-stream, truncation or the
//!    capture-time budget, dropping table-maintenance tokens.
//! 2. **Reassociating**: attach buffered properties and property headers
//!    to their actor, derive actor class names, record summaries and cut
//!    the stream into frames at every frame marker.
//!
//! Properties and property headers are written on the wire before the
//! actor they belong to, so pass 2 holds them until the owning actor token
//! arrives. An actor's summaries are recorded once the next actor or the
//! end of the frame closes it.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use netprof_aggregate::frame_stats;
use netprof_core::filter::FilterSpec;
use netprof_core::frame::Frame;
use netprof_core::names::NameTable;
use netprof_core::stats::FrameStats;
use netprof_core::summary::SummaryMap;
use netprof_core::token::{PropertyRecord, ReplicateActor, Token};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::decoder::{TokenCounts, TokenDecoder};
use crate::error::{DecodeError, Result};
use crate::reader::PrimitiveReader;

/// How the token stream ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StreamEnd {
    /// An end-of-stream marker was decoded.
    #[default]
    EndOfStreamMarker,
    /// The input ran out, possibly inside a record.
    Truncated,
    /// The capture-time budget was exceeded.
    TimeBudget,
}

/// Facts about the decode that are not part of any frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    pub token_counts: TokenCounts,
    /// Properties and headers dropped for lack of an owning actor.
    pub orphaned_properties: u64,
    /// Actors whose class name could not be derived.
    pub unresolved_classes: u64,
    pub end: StreamEnd,
}

/// Load phase, used for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Scanning,
    Reassociating,
}

impl LoadPhase {
    /// Maps progress within the phase onto the overall 0..1 range.
    #[must_use]
    pub fn overall(self, fraction: f32) -> f32 {
        let fraction = fraction.clamp(0.0, 1.0);
        match self {
            LoadPhase::Scanning => 0.5 * fraction,
            LoadPhase::Reassociating => 0.5 + 0.5 * fraction,
        }
    }
}

/// Cancellation and progress polling at a fixed token interval.
pub(crate) struct Poller<'a> {
    cancel: &'a AtomicBool,
    progress: &'a mut dyn FnMut(f32),
    interval: usize,
    ticks: usize,
    reported: f32,
}

impl<'a> Poller<'a> {
    pub(crate) fn new(cancel: &'a AtomicBool, progress: &'a mut dyn FnMut(f32), interval: usize) -> Self {
        Self {
            cancel,
            progress,
            interval: interval.max(1),
            ticks: 0,
            reported: 0.0,
        }
    }

    /// Counts one token and polls when the interval is reached.
    pub(crate) fn tick(&mut self, phase: LoadPhase, fraction: impl FnOnce() -> f32) -> Result<()> {
        self.ticks += 1;
        if self.ticks % self.interval == 0 {
            self.poll(phase, fraction())
        } else {
            Ok(())
        }
    }

    /// Checks for cancellation and reports progress.
    pub(crate) fn poll(&mut self, phase: LoadPhase, fraction: f32) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(DecodeError::Cancelled);
        }
        self.report(phase.overall(fraction));
        Ok(())
    }

    /// Reports `value`, never going backwards.
    pub(crate) fn report(&mut self, value: f32) {
        if value > self.reported {
            self.reported = value;
            (self.progress)(value);
        }
    }
}

/// Trace tokens from pass 1.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScannedStream {
    pub(crate) tokens: Vec<Token>,
    pub(crate) end: StreamEnd,
}

/// Pass 1: decodes trace tokens until the stream ends.
pub(crate) fn scan_tokens(
    decoder: &mut TokenDecoder,
    reader: &mut PrimitiveReader<'_>,
    max_capture_minutes: Option<f32>,
    poller: &mut Poller<'_>,
) -> Result<ScannedStream> {
    let start = reader.position();
    let span = reader.len().saturating_sub(start).max(1);
    let budget_seconds = max_capture_minutes.map(|minutes| minutes * 60.0);
    let mut first_marker_time = None;
    let mut scanned = ScannedStream::default();

    debug!("Scanning {} bytes of tokens", reader.remaining());

    loop {
        let token = match decoder.decode_next(reader) {
            Ok(token) => token,
            Err(DecodeError::Truncated { offset, needed }) => {
                debug!("Token stream ends at offset {offset} ({needed} bytes short)");
                scanned.end = StreamEnd::Truncated;
                break;
            }
            Err(e) => return Err(e),
        };

        #[allow(clippy::cast_precision_loss)]
        let fraction = || (reader.position() - start) as f32 / span as f32;
        poller.tick(LoadPhase::Scanning, fraction)?;

        match &token {
            Token::EndOfStream(_) => {
                scanned.tokens.push(token);
                scanned.end = StreamEnd::EndOfStreamMarker;
                break;
            }
            Token::FrameMarker(marker) => {
                let first = *first_marker_time.get_or_insert(marker.relative_time);
                let over_budget =
                    budget_seconds.is_some_and(|budget| marker.relative_time - first > budget);
                scanned.tokens.push(token);
                if over_budget {
                    debug!("Capture-time budget reached after {} tokens", scanned.tokens.len());
                    scanned.end = StreamEnd::TimeBudget;
                    break;
                }
            }
            t if t.is_table_maintenance() => {}
            _ => scanned.tokens.push(token),
        }
    }

    Ok(scanned)
}

/// Everything pass 2 produces.
#[derive(Debug, Clone, Default)]
pub struct AssembledStream {
    pub frames: Vec<Frame>,
    /// Sum of all frame counters.
    pub totals: FrameStats,
    /// Per actor class: replicated bits and replication time.
    pub actor_summary: SummaryMap,
    /// Per property name: replicated bits.
    pub property_summary: SummaryMap,
    /// Per RPC function name: serialized bits.
    pub rpc_summary: SummaryMap,
    pub orphaned_properties: u64,
    pub unresolved_classes: u64,
}

/// Pass 2: groups trace tokens into frames.
///
/// Feed tokens in stream order with [`FrameAssembler::push`], then call
/// [`FrameAssembler::finish`]. Class names are appended to `names` as
/// actors are seen.
#[derive(Debug)]
pub struct FrameAssembler<'a> {
    names: &'a mut NameTable,
    fallback_delta: f32,
    pending_properties: Vec<PropertyRecord>,
    pending_property_headers: Vec<PropertyRecord>,
    current_actor: Option<usize>,
    frame_tokens: Vec<Token>,
    previous_marker_time: Option<f32>,
    last_delta: Option<f32>,
    out: AssembledStream,
}

impl<'a> FrameAssembler<'a> {
    pub fn new(names: &'a mut NameTable, fallback_delta: f32) -> Self {
        Self {
            names,
            fallback_delta,
            pending_properties: Vec::new(),
            pending_property_headers: Vec::new(),
            current_actor: None,
            frame_tokens: Vec::new(),
            previous_marker_time: None,
            last_delta: None,
            out: AssembledStream::default(),
        }
    }

    /// Number of frames closed so far.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.out.frames.len()
    }

    pub fn push(&mut self, token: Token) {
        match token {
            Token::ReplicateProperty(property) => self.pending_properties.push(property),
            Token::WritePropertyHeader(header) => self.pending_property_headers.push(header),
            Token::ReplicateActor(actor) => self.push_actor(actor),
            Token::SendRpc(rpc) => {
                self.out
                    .rpc_summary
                    .record(rpc.function_name_index, rpc.size_bits(), 0.0);
                self.frame_tokens.push(Token::SendRpc(rpc));
            }
            Token::FrameMarker(marker) => self.close_frame(Some(marker.relative_time)),
            Token::EndOfStream(_) => self.close_frame(None),
            Token::ConnectionChange(_) | Token::NameReference(_) | Token::ConnectionReference(_) => {}
            other => self.frame_tokens.push(other),
        }
    }

    /// Closes any trailing frame and returns the result.
    #[must_use]
    pub fn finish(mut self) -> AssembledStream {
        if !self.frame_tokens.is_empty() || self.has_pending() {
            self.close_frame(None);
        }
        self.out
    }

    fn has_pending(&self) -> bool {
        !self.pending_properties.is_empty() || !self.pending_property_headers.is_empty()
    }

    fn push_actor(&mut self, mut actor: ReplicateActor) {
        self.close_actor();

        actor.properties.append(&mut self.pending_properties);
        actor
            .property_headers
            .append(&mut self.pending_property_headers);

        actor.class_name_index = match self.names.class_name_index(actor.actor_name_index) {
            Ok(index) => index,
            Err(e) => {
                warn!("{e}; counting actor under class 0");
                self.out.unresolved_classes += 1;
                0
            }
        };

        self.current_actor = Some(self.frame_tokens.len());
        self.frame_tokens.push(Token::ReplicateActor(actor));
    }

    /// Records the summaries of the current actor.
    fn close_actor(&mut self) {
        let Some(slot) = self.current_actor.take() else {
            return;
        };
        let Some(Token::ReplicateActor(actor)) = self.frame_tokens.get(slot) else {
            return;
        };

        self.out.actor_summary.record(
            actor.class_name_index,
            actor.replicated_bits(),
            f64::from(actor.time_ms),
        );
        for property in &actor.properties {
            self.out.property_summary.record(
                property.property_name_index,
                u64::from(property.size_bits),
                0.0,
            );
        }
    }

    fn drop_orphans(&mut self) {
        let orphans = self.pending_properties.len() + self.pending_property_headers.len();
        if orphans > 0 {
            warn!("Dropping {orphans} properties with no following actor");
            self.out.orphaned_properties += orphans as u64;
            self.pending_properties.clear();
            self.pending_property_headers.clear();
        }
    }

    fn close_frame(&mut self, marker_time: Option<f32>) {
        self.close_actor();
        self.drop_orphans();

        let observed_delta = marker_time
            .zip(self.previous_marker_time)
            .map(|(now, previous)| now - previous);

        if !self.frame_tokens.is_empty() {
            let (end_time, delta) = match (marker_time, observed_delta) {
                (Some(now), Some(delta)) => (now, delta),
                (Some(now), None) => (now, self.fallback_delta),
                (None, _) => {
                    let delta = self.last_delta.unwrap_or(self.fallback_delta);
                    (self.previous_marker_time.unwrap_or(0.0) + delta, delta)
                }
            };

            let tokens = std::mem::take(&mut self.frame_tokens);
            let stats = frame_stats(&tokens, &FilterSpec::new(), self.names);
            self.out.totals.merge(&stats);
            debug!(
                "Frame {}: {} tokens, {:.4}s",
                self.out.frames.len(),
                tokens.len(),
                delta
            );
            self.out.frames.push(Frame::new(tokens, end_time, delta, stats));
        }

        if let Some(now) = marker_time {
            if observed_delta.is_some() {
                self.last_delta = observed_delta;
            }
            self.previous_marker_time = Some(now);
        }
    }
}
