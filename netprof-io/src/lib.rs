//! netprof-io: File access for netprof.
//!
//! This crate maps capture files into memory with memmap2, hands the bytes
//! to the decoder, and writes CSV reports of frames and rollups.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{load_file, MappedCaptureReader};
pub use writer::ReportWriter;
