//! netprof: command-line reports for network replication captures.
//!
//! Loads a capture and prints its frames, top talkers, or CSV reports.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand, ValueEnum};

use log::{debug, info};
use netprof_aggregate::{Aggregate, ItemRollup, TrackedItem, UniqueItemTracker};
use netprof_core::filter::FilterSpec;
use netprof_core::token::ChannelType;
use netprof_io::{load_file, ReportWriter};
use netprof_stream::{Capture, LoadConfig};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    NetprofIo(#[from] netprof_io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] netprof_stream::DecodeError),

    #[error("Core error: {0}")]
    Core(#[from] netprof_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Network replication capture analyzer.
#[derive(Parser)]
#[command(name = "netprof")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Loader configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only decode the first N minutes of capture time
    #[arg(long, global = true)]
    max_minutes: Option<f32>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Token filter options.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Actor name substring (case-insensitive)
    #[arg(long, default_value = "")]
    actor: String,

    /// Property name substring (case-insensitive)
    #[arg(long, default_value = "")]
    property: String,

    /// RPC name substring (case-insensitive)
    #[arg(long, default_value = "")]
    rpc: String,

    /// Only count these connection indices (repeatable)
    #[arg(long = "connection")]
    connections: Vec<u32>,
}

impl FilterArgs {
    fn to_filter(&self) -> FilterSpec {
        let filter = FilterSpec::new()
            .with_actor(&self.actor)
            .with_property(&self.property)
            .with_rpc(&self.rpc);
        if self.connections.is_empty() {
            filter
        } else {
            filter.with_connections(self.connections.iter().copied())
        }
    }
}

/// Frame range options.
#[derive(Args, Debug)]
struct RangeArgs {
    /// First frame index
    #[arg(long, default_value = "0")]
    start: usize,

    /// One past the last frame index (default: all frames)
    #[arg(long)]
    end: Option<usize>,
}

impl RangeArgs {
    fn range(&self) -> Range<usize> {
        self.start..self.end.unwrap_or(usize::MAX)
    }
}

/// Report kind for export.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportKind {
    /// One row per frame
    Frames,
    /// Actor class rollup
    Classes,
    /// RPC rollup
    Rpcs,
}

/// Sort key for top listings.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortKey {
    /// Total serialized bits
    Size,
    /// Number of occurrences
    Count,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header, tables and whole-capture totals
    Info {
        /// Input capture file
        input: PathBuf,

        /// Print the totals as JSON
        #[arg(long)]
        json: bool,
    },

    /// List per-frame counters
    Frames {
        /// Input capture file
        input: PathBuf,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Maximum number of rows
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show the heaviest actor classes, properties and RPCs
    Top {
        /// Input capture file
        input: PathBuf,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Entries per table
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Sort order
        #[arg(long, value_enum, default_value = "size")]
        by: SortKey,

        /// Print the aggregate as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a CSV report
    Export {
        /// Input capture file
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Report to write
        #[arg(short, long, value_enum, default_value = "frames")]
        kind: ReportKind,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(cli: &Cli) -> Result<LoadConfig> {
    let mut config = match &cli.config {
        Some(path) => LoadConfig::from_file(path)?,
        None => LoadConfig::default(),
    };
    if let Some(minutes) = cli.max_minutes {
        config = config.with_max_capture_minutes(minutes);
    }
    config.validate()?;
    Ok(config)
}

fn open_capture(path: &Path, config: &LoadConfig) -> Result<Capture> {
    let start = Instant::now();
    let cancel = AtomicBool::new(false);
    let mut next_report = 0.1f32;
    let capture = load_file(path, config, &cancel, |progress| {
        while progress >= next_report {
            debug!("Loading {}: {:.0}%", path.display(), next_report * 100.0);
            next_report += 0.1;
        }
    })?;
    info!(
        "Loaded {} in {:.2}s",
        path.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(capture)
}

fn bytes(bits: u64) -> f64 {
    bits as f64 / 8.0
}

fn print_info(input: &Path, capture: &Capture, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(capture.totals())?);
        return Ok(());
    }

    let header = capture.header();
    let totals = capture.totals();
    let diagnostics = capture.diagnostics();

    println!("File: {}", input.display());
    println!("Game: {}", header.game_name);
    println!("Tag: {}", header.tag);
    println!("URL: {}", header.url);
    println!("Byte order: {}", header.byte_order.name());
    println!("Frames: {}", capture.frames().len());
    println!("Duration: {:.2}s", capture.duration());
    println!("Names: {}", capture.names().len());
    println!("Ended by: {:?}", diagnostics.end);

    println!("Connections:");
    for index in 0..capture.addresses().len() as u32 {
        println!("  [{}] {}", index, capture.address_string(index));
    }

    let rows = [
        ("Engine socket", totals.unreal_socket_count, totals.unreal_socket_size * 8),
        ("Other sockets", totals.other_socket_count, totals.other_socket_size * 8),
        ("Bunches", totals.send_bunch_count, totals.send_bunch_size_bits),
        ("Properties", totals.property_count, totals.property_size_bits),
        ("RPCs", totals.rpc_count, totals.rpc_size_bits),
        ("Acks", totals.ack_count, totals.ack_size_bits),
    ];
    for (label, count, bits) in rows {
        println!("{:<14} {:>10} {:>14.0} bytes", label, count, bytes(bits));
    }
    for channel in ChannelType::ALL {
        let stats = totals.channel(channel);
        if stats.count > 0 {
            let label = format!("  {}", channel.name());
            println!("{:<14} {:>10} {:>14.0} bytes", label, stats.count, bytes(stats.size_bits));
        }
    }
    println!(
        "Actors: {} ({} replicated, {:.2} ms)",
        totals.actor_count, totals.replicated_actor_count, totals.actor_replicate_time_ms
    );
    println!(
        "Bunch overhead: {:.0} bytes",
        bytes(totals.bunch_protocol_overhead_bits())
    );

    println!("Tokens:");
    for (kind, count) in diagnostics.token_counts.iter() {
        println!("  {:<22} {}", kind.name(), count);
    }
    if diagnostics.orphaned_properties > 0 {
        println!("Orphaned properties: {}", diagnostics.orphaned_properties);
    }
    if diagnostics.unresolved_classes > 0 {
        println!("Unresolved actor classes: {}", diagnostics.unresolved_classes);
    }
    Ok(())
}

fn print_frames(capture: &Capture, range: Range<usize>, filter: &FilterSpec, limit: usize) {
    let range = capture.clamp_range(range);
    println!(
        "{:>7} | {:>9} | {:>8} | {:>9} | {:>7} | {:>6} | {:>10} | {:>5}",
        "Frame", "Time (s)", "Delta ms", "Bytes", "Bunches", "Actors", "Properties", "RPCs"
    );
    println!("{:-<88}", "");

    for index in range.clone().take(limit) {
        let frame = &capture.frames()[index];
        let stats = capture.aggregate(index..index + 1, filter).stats;
        println!(
            "{:>7} | {:>9.3} | {:>8.2} | {:>9} | {:>7} | {:>6} | {:>10} | {:>5}",
            index,
            frame.start_time,
            frame.delta_time * 1000.0,
            stats.total_socket_bytes(),
            stats.send_bunch_count,
            stats.actor_count,
            stats.property_count,
            stats.rpc_count
        );
    }
    if range.len() > limit {
        println!("... {} more frames", range.len() - limit);
    }
}

impl SortKey {
    fn sort<D: Default>(self, tracker: &UniqueItemTracker<u32, D>) -> Vec<(u32, &TrackedItem<D>)> {
        match self {
            SortKey::Size => tracker.sorted_by_size(),
            SortKey::Count => tracker.sorted_by_count(),
        }
    }
}

fn print_rollup_row(indent: usize, name: &str, rollup: &ItemRollup) {
    println!(
        "{:indent$}{:<width$} | {:>8} | {:>10} | {:>12.0} | {:>10.2}",
        "",
        name,
        rollup.count,
        rollup.replicated_count,
        bytes(rollup.size_bits),
        rollup.time_ms,
        width = 32 - indent,
    );
}

fn print_rollup_header(title: &str) {
    println!(
        "{:<32} | {:>8} | {:>10} | {:>12} | {:>10}",
        title, "Count", "Replicated", "Bytes", "Time (ms)"
    );
    println!("{:-<84}", "");
}

fn print_top(capture: &Capture, aggregate: &Aggregate, limit: usize, by: SortKey) {
    print_rollup_header("Actor class");
    for (class, item) in by.sort(&aggregate.actor_classes).into_iter().take(limit) {
        print_rollup_row(0, capture.name(class), &item.rollup);
        for (property, detail) in item.detail.sorted_by_size().into_iter().take(3) {
            print_rollup_row(4, capture.name(property), &detail.rollup);
        }
    }

    println!();
    print_rollup_header("RPC");
    for (function, item) in by.sort(&aggregate.rpcs).into_iter().take(limit) {
        print_rollup_row(0, capture.name(function), &item.rollup);
    }

    if let Some(rate) = aggregate.per_second(aggregate.stats.total_socket_bytes() as f64) {
        println!();
        println!(
            "{} frames over {:.2}s: {:.0} bytes/s",
            aggregate.stats.frame_count,
            aggregate.duration(),
            rate
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Info { input, json } => {
            let capture = open_capture(input, &config)?;
            print_info(input, &capture, *json)?;
        }

        Commands::Frames {
            input,
            range,
            filter,
            limit,
        } => {
            let capture = open_capture(input, &config)?;
            print_frames(&capture, range.range(), &filter.to_filter(), *limit);
        }

        Commands::Top {
            input,
            range,
            filter,
            limit,
            by,
            json,
        } => {
            let capture = open_capture(input, &config)?;
            let aggregate = capture.aggregate(range.range(), &filter.to_filter());
            if *json {
                println!("{}", serde_json::to_string_pretty(&aggregate)?);
            } else {
                print_top(&capture, &aggregate, *limit, *by);
            }
        }

        Commands::Export {
            input,
            output,
            kind,
            range,
            filter,
        } => {
            let capture = open_capture(input, &config)?;
            let filter = filter.to_filter();
            let mut writer = ReportWriter::create(output)?;
            match kind {
                ReportKind::Frames => writer.write_frames_csv(&capture, range.range(), &filter)?,
                ReportKind::Classes => {
                    let aggregate = capture.aggregate(range.range(), &filter);
                    writer.write_classes_csv(&capture, &aggregate)?;
                }
                ReportKind::Rpcs => {
                    let aggregate = capture.aggregate(range.range(), &filter);
                    writer.write_rpcs_csv(&capture, &aggregate)?;
                }
            }
            println!("Wrote {:?} report to {}", kind, output.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_top() {
        let cli = Cli::try_parse_from([
            "netprof",
            "top",
            "capture.nprof",
            "--actor",
            "Pawn",
            "--connection",
            "1",
            "--connection",
            "3",
            "--end",
            "100",
            "--by",
            "count",
            "--max-minutes",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.max_minutes, Some(2.0));
        let Commands::Top {
            range, filter, by, ..
        } = cli.command
        else {
            panic!("expected top");
        };
        assert_eq!(range.range(), 0..100);
        assert!(matches!(by, SortKey::Count));
        let spec = filter.to_filter();
        assert_eq!(spec.actor(), "pawn");
        assert!(spec.allows_connection(3));
        assert!(!spec.allows_connection(2));
    }

    #[test]
    fn test_empty_filter_args() {
        assert!(FilterArgs::default().to_filter().is_empty());
    }

    #[test]
    fn test_open_range() {
        let range = RangeArgs {
            start: 5,
            end: None,
        };
        assert_eq!(range.range(), 5..usize::MAX);
    }
}
