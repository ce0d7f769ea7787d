//! Loaded capture model and the load entry points.

use std::ops::Range;
use std::sync::atomic::AtomicBool;

use log::info;
use netprof_aggregate::{filter_frame, Aggregate, AggregateConfig, Aggregator};
use netprof_core::filter::FilterSpec;
use netprof_core::frame::Frame;
use netprof_core::names::{AddressTable, NameTable};
use netprof_core::stats::FrameStats;
use netprof_core::summary::SummaryMap;
use netprof_core::tracker::TokenRef;

use crate::assembler::{scan_tokens, Diagnostics, FrameAssembler, LoadPhase, Poller};
use crate::config::LoadConfig;
use crate::decoder::TokenDecoder;
use crate::error::Result;
use crate::header::{read_header, CaptureHeader};

/// A fully decoded capture.
///
/// Immutable once built; every query takes `&self` and may run
/// concurrently with other queries.
#[derive(Debug, Clone)]
pub struct Capture {
    header: CaptureHeader,
    names: NameTable,
    addresses: AddressTable,
    frames: Vec<Frame>,
    totals: FrameStats,
    actor_summary: SummaryMap,
    property_summary: SummaryMap,
    rpc_summary: SummaryMap,
    diagnostics: Diagnostics,
    aggregate_config: AggregateConfig,
}

impl Capture {
    #[must_use]
    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Counters summed over every frame.
    #[must_use]
    pub fn totals(&self) -> &FrameStats {
        &self.totals
    }

    /// Per actor class name index.
    #[must_use]
    pub fn actor_summary(&self) -> &SummaryMap {
        &self.actor_summary
    }

    /// Per property name index.
    #[must_use]
    pub fn property_summary(&self) -> &SummaryMap {
        &self.property_summary
    }

    /// Per RPC function name index.
    #[must_use]
    pub fn rpc_summary(&self) -> &SummaryMap {
        &self.rpc_summary
    }

    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    #[must_use]
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressTable {
        &self.addresses
    }

    /// Name at `index`, or `""` if there is none.
    #[must_use]
    pub fn name(&self, index: u32) -> &str {
        self.names.get(index).unwrap_or_default()
    }

    /// Connection endpoint as `a.b.c.d:port`.
    #[must_use]
    pub fn address_string(&self, connection_index: u32) -> String {
        self.addresses
            .endpoint(connection_index)
            .map_or_else(|_| format!("<connection {connection_index}>"), |e| e.to_string())
    }

    /// Time from the start of the first frame to the end of the last.
    #[must_use]
    pub fn duration(&self) -> f32 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.end_time - first.start_time,
            _ => 0.0,
        }
    }

    /// Clamps `range` to the frame list.
    #[must_use]
    pub fn clamp_range(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.frames.len());
        range.start.min(end)..end
    }

    /// Aggregates the frames in `range` under `filter`.
    ///
    /// Out-of-range bounds are clamped; an empty range gives an empty
    /// aggregate.
    #[must_use]
    pub fn aggregate(&self, range: Range<usize>, filter: &FilterSpec) -> Aggregate {
        let range = self.clamp_range(range);
        self.aggregator()
            .aggregate_frames(&self.frames[range.clone()], range.start, filter)
    }

    /// Like [`Capture::aggregate`], giving up when `cancel` is set.
    #[must_use]
    pub fn aggregate_cancellable(
        &self,
        range: Range<usize>,
        filter: &FilterSpec,
        cancel: &AtomicBool,
    ) -> Option<Aggregate> {
        let range = self.clamp_range(range);
        self.aggregator().aggregate_frames_cancellable(
            &self.frames[range.clone()],
            range.start,
            filter,
            cancel,
        )
    }

    /// Aggregates a single token.
    ///
    /// # Errors
    /// Returns [`netprof_core::Error::InvalidTokenRef`] if the frame or
    /// token index is out of bounds.
    pub fn aggregate_token(&self, frame: usize, token: usize, filter: &FilterSpec) -> Result<Aggregate> {
        let selected = self
            .frames
            .get(frame)
            .and_then(|f| f.tokens.get(token))
            .ok_or(netprof_core::Error::InvalidTokenRef { frame, token })?;
        Ok(self
            .aggregator()
            .aggregate_token(selected, TokenRef { frame, token }, filter))
    }

    /// Filtered copies of the frames in `range`.
    #[must_use]
    pub fn filtered_frames(&self, range: Range<usize>, filter: &FilterSpec) -> Vec<Frame> {
        let range = self.clamp_range(range);
        self.frames[range]
            .iter()
            .map(|frame| filter_frame(frame, filter, &self.names))
            .collect()
    }

    fn aggregator(&self) -> Aggregator<'_> {
        Aggregator::with_config(&self.names, self.aggregate_config.clone())
    }
}

/// Decodes a capture with the default configuration.
///
/// `progress` receives non-decreasing values in `0.0..=1.0`. Setting
/// `cancel` abandons the load with [`crate::DecodeError::Cancelled`].
///
/// # Errors
/// Fails on a bad header, an unknown token tag, or cancellation. A capture
/// that simply ends early is not an error.
pub fn load(data: &[u8], cancel: &AtomicBool, progress: impl FnMut(f32)) -> Result<Capture> {
    load_with_config(data, &LoadConfig::default(), cancel, progress)
}

/// Decodes a capture.
///
/// # Errors
/// As [`load`], plus [`crate::DecodeError::Config`] for an invalid `config`.
pub fn load_with_config(
    data: &[u8],
    config: &LoadConfig,
    cancel: &AtomicBool,
    mut progress: impl FnMut(f32),
) -> Result<Capture> {
    config.validate()?;
    let mut poller = Poller::new(cancel, &mut progress, config.poll_interval);

    let (header, mut reader) = read_header(data)?;
    let mut decoder = TokenDecoder::new(NameTable::with_engine_socket_name(
        config.engine_socket_name.clone(),
    ));
    let scanned = scan_tokens(
        &mut decoder,
        &mut reader,
        config.max_capture_minutes,
        &mut poller,
    )?;
    poller.poll(LoadPhase::Scanning, 1.0)?;

    let (mut names, addresses, token_counts) = decoder.into_parts();
    let total = scanned.tokens.len().max(1);
    let mut assembler = FrameAssembler::new(&mut names, config.fallback_frame_delta);
    for (i, token) in scanned.tokens.into_iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let fraction = || (i + 1) as f32 / total as f32;
        poller.tick(LoadPhase::Reassociating, fraction)?;
        assembler.push(token);
    }
    let assembled = assembler.finish();
    poller.poll(LoadPhase::Reassociating, 1.0)?;

    let diagnostics = Diagnostics {
        token_counts,
        orphaned_properties: assembled.orphaned_properties,
        unresolved_classes: assembled.unresolved_classes,
        end: scanned.end,
    };

    info!(
        "Loaded '{}' ({}): {} frames, {} names, {} connections, ended by {:?}",
        header.game_name,
        header.tag,
        assembled.frames.len(),
        names.len(),
        addresses.len(),
        diagnostics.end
    );

    Ok(Capture {
        header,
        names,
        addresses,
        frames: assembled.frames,
        totals: assembled.totals,
        actor_summary: assembled.actor_summary,
        property_summary: assembled.property_summary,
        rpc_summary: assembled.rpc_summary,
        diagnostics,
        aggregate_config: config.aggregate_config(),
    })
}
