//! Command-line interface for robolog.
//!
//! Decodes a WPILOG, RLOG or driver station log (optionally merged with a
//! second log) and writes it as CSV, WPILOG, Parquet or serialized JSON.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use robolog::dslog::decode_ds_logs;
use robolog::export::{export, select_fields, ExportFormat, ExportOptions, ExportOutput, SamplingMode};
use robolog::reader::load_file;
use robolog::rlog::decode_rlog;
use robolog::{Error, LogStore, ParquetWriter, WpilogReader};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    CsvTable,
    CsvList,
    Wpilog,
    Parquet,
    /// Serialized log as JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert robot telemetry logs to CSV, WPILOG, Parquet or JSON",
    long_about = "Decodes .wpilog, .rlog, .dslog and .dsevents files into a single time-indexed log \
                  and exports a selection of its fields.\n\n\
                  A .dslog input also loads the .dsevents file next to it, if present."
)]
struct Args {
    /// Log file to convert
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Second log to merge into the first
    #[arg(long, value_name = "INPUT")]
    merge: Option<PathBuf>,

    /// Seconds added to every timestamp of the merged log
    #[arg(long, default_value = "0")]
    merge_offset: f64,

    /// Output format
    #[arg(short, long, value_enum)]
    format: OutputFormat,

    /// Output file (or directory for Parquet)
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Comma-separated field prefixes to export, e.g. "/DSLog,/Drive"
    #[arg(long, default_value = "")]
    prefixes: String,

    /// Resample CSV tables on a fixed period instead of at every change
    #[arg(long, value_name = "MS")]
    sampling_period_ms: Option<f64>,

    /// Also export the per-index fields of arrays
    #[arg(long)]
    include_array_items: bool,

    /// Number of rows per Parquet file chunk
    #[arg(long, default_value = "50000")]
    chunk_size: usize,
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn load_log(path: &Path) -> robolog::Result<LogStore> {
    match extension(path).as_str() {
        "wpilog" => {
            let reader = WpilogReader::from_file(path)?;
            info!("   ├─ WPILOG version: {:#06x}", reader.version());
            let extra_header = reader.extra_header();
            if !extra_header.is_empty() {
                info!("   ├─ Extra header: {}", extra_header);
            }
            reader.read_log()
        }
        "rlog" => decode_rlog(&load_file(path)?),
        "dslog" => {
            let ds_log = load_file(path)?;
            let events_path = path.with_extension("dsevents");
            let ds_events = if events_path.exists() {
                info!("   ├─ Including events from {}", events_path.display());
                Some(load_file(&events_path)?)
            } else {
                None
            };
            decode_ds_logs(Some(&ds_log[..]), ds_events.as_deref())
        }
        "dsevents" => {
            let ds_events = load_file(path)?;
            decode_ds_logs(None, Some(&ds_events[..]))
        }
        other => Err(Error::InvalidFormat(format!(
            "Unrecognized log extension '{}' for {}",
            other,
            path.display()
        ))),
    }
}

fn read_input(path: &Path) -> Result<LogStore> {
    info!("📄 Reading: {}", path.display());
    let t0 = Instant::now();
    let log = load_log(path)?;
    let (start, end) = log.get_timestamp_range();
    info!(
        "   └─ {} fields from {:.2}s to {:.2}s in {:.2?}",
        log.get_field_count(),
        start,
        end,
        t0.elapsed()
    );
    Ok(log)
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let total_start = Instant::now();

    let mut log = read_input(&args.input)?;
    if let Some(merge_path) = &args.merge {
        let other = read_input(merge_path)?;
        info!("🔗 Merging with offset {}s", args.merge_offset);
        log = LogStore::merge(&log, &other, args.merge_offset);
    }

    let export_format = match args.format {
        OutputFormat::Json => {
            fs::write(&args.output, serde_json::to_string(&log.to_serialized())?)?;
            info!("🏁 Wrote {} in {:.2?}", args.output.display(), total_start.elapsed());
            return Ok(());
        }
        OutputFormat::Parquet => {
            let fields = select_fields(&log, &args.prefixes, args.include_array_items);
            let stats = ParquetWriter::new(&args.output)
                .chunk_size(args.chunk_size)
                .write_with_stats(&log, &fields)?;
            info!("   ├─ {}", stats.summary());
            info!("🏁 Wrote {} in {:.2?}", args.output.display(), total_start.elapsed());
            return Ok(());
        }
        OutputFormat::CsvTable => ExportFormat::CsvTable,
        OutputFormat::CsvList => ExportFormat::CsvList,
        OutputFormat::Wpilog => ExportFormat::Wpilog,
    };

    let sampling_mode = match args.sampling_period_ms {
        Some(period_ms) => SamplingMode::Fixed(period_ms / 1000.0),
        None => SamplingMode::Changes,
    };
    let options = ExportOptions::new(export_format)
        .prefixes(args.prefixes.as_str())
        .sampling_mode(sampling_mode)
        .include_array_items(args.include_array_items);

    match export(&log, &options)? {
        ExportOutput::Text(text) => fs::write(&args.output, text)?,
        ExportOutput::Bytes(bytes) => fs::write(&args.output, bytes)?,
    }
    info!("🏁 Wrote {} in {:.2?}", args.output.display(), total_start.elapsed());

    Ok(())
}
