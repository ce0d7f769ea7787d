//! CSV report writers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use netprof_aggregate::{frame_stats, Aggregate};
use netprof_core::filter::FilterSpec;
use netprof_stream::Capture;

use crate::Result;

/// Writer for capture reports.
///
/// Names are written as-is; commas and quotes in names are escaped.
pub struct ReportWriter {
    writer: BufWriter<File>,
}

impl ReportWriter {
    /// Creates a new report file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes one row per frame in `range`, counted under `filter`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_frames_csv(
        &mut self,
        capture: &Capture,
        range: Range<usize>,
        filter: &FilterSpec,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "frame,start_time,delta_time,engine_bytes,other_bytes,bunches,bunch_bits,\
             actors,replicated_actors,properties,property_bits,rpcs,rpc_bits,overhead_bits"
        )?;

        let range = capture.clamp_range(range);
        let first = range.start;
        for (i, frame) in capture.frames()[range].iter().enumerate() {
            let filtered;
            let stats = if filter.is_empty() {
                &frame.stats
            } else {
                filtered = frame_stats(&frame.tokens, filter, capture.names());
                &filtered
            };
            writeln!(
                self.writer,
                "{},{:.6},{:.6},{},{},{},{},{},{},{},{},{},{},{}",
                first + i,
                frame.start_time,
                frame.delta_time,
                stats.unreal_socket_size,
                stats.other_socket_size,
                stats.send_bunch_count,
                stats.send_bunch_size_bits,
                stats.actor_count,
                stats.replicated_actor_count,
                stats.property_count,
                stats.property_size_bits,
                stats.rpc_count,
                stats.rpc_size_bits,
                stats.bunch_protocol_overhead_bits()
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes the per-class rollup of `aggregate`, largest first.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_classes_csv(&mut self, capture: &Capture, aggregate: &Aggregate) -> Result<()> {
        writeln!(
            self.writer,
            "class,count,replicated,size_bits,time_ms,properties"
        )?;
        for (class, item) in aggregate.actor_classes.sorted_by_size() {
            writeln!(
                self.writer,
                "{},{},{},{},{:.3},{}",
                escape(capture.name(class)),
                item.rollup.count,
                item.rollup.replicated_count,
                item.rollup.size_bits,
                item.rollup.time_ms,
                item.detail.len()
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the per-RPC rollup of `aggregate`, largest first.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_rpcs_csv(&mut self, capture: &Capture, aggregate: &Aggregate) -> Result<()> {
        writeln!(self.writer, "rpc,count,size_bits")?;
        for (function, item) in aggregate.rpcs.sorted_by_size() {
            writeln!(
                self.writer,
                "{},{},{}",
                escape(capture.name(function)),
                item.rollup.count,
                item.rollup.size_bits
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
