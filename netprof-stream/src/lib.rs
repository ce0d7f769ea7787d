//! netprof-stream: capture decoder and stream assembler.
//!
//! This crate turns the bytes of a network replication capture into an
//! immutable [`Capture`] of frames, name tables and summaries.
//!
//! # Key Components
//!
//! - [`PrimitiveReader`] - byte-order aware reads, packed integers and
//!   length-prefixed buffers
//! - [`read_header`] - magic/version check and byte-order detection
//! - [`TokenDecoder`] - one `{tag, payload}` record at a time, maintaining
//!   the name and address tables
//! - [`FrameAssembler`] - property reassociation and frame partitioning
//! - [`Capture`] - the loaded model and its aggregation queries
//!
//! # Loading Pipeline
//!
//! 1. **Header**: detect byte order and check the version
//! 2. **Scanning**: decode trace tokens up to the end of stream, the end
//!    of input or the capture-time budget
//! 3. **Reassociating**: attach properties to actors, derive class names
//!    and cut frames at frame markers
//!
//! Progress is reported as 0..0.5 while scanning and 0.5..1 while
//! reassociating.

mod assembler;
mod capture;
mod config;
mod decoder;
pub mod error;
mod header;
mod reader;

pub use assembler::{AssembledStream, Diagnostics, FrameAssembler, LoadPhase, StreamEnd};
pub use capture::{load, load_with_config, Capture};
pub use config::{LoadConfig, DEFAULT_FRAME_DELTA, DEFAULT_POLL_INTERVAL};
pub use decoder::{TokenCounts, TokenDecoder};
pub use error::{DecodeError, Result};
pub use header::{read_header, CaptureHeader, CAPTURE_MAGIC, CAPTURE_VERSION};
pub use reader::{ByteOrder, PrimitiveReader};

// Re-export the query types callers need alongside a capture
pub use netprof_aggregate::{Aggregate, AggregateConfig};
pub use netprof_core::filter::FilterSpec;
pub use netprof_core::frame::Frame;
