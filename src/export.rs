//! Export generators: CSV table, CSV event list and WPILOG re-encoding of a
//! selection of fields.

use serde::{Deserialize, Serialize};

use crate::datalog::StartRecordData;
use crate::encoder::{secs_to_micros, DataLogWriter, EncoderRecord};
use crate::error::{Error, Result};
use crate::log::LogStore;
use crate::models::{FieldTreeNode, LogValue};
use std::collections::BTreeMap;

pub const DEFAULT_EXTRA_HEADER: &str = "robolog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    CsvTable,
    CsvList,
    Wpilog,
}

/// Row timestamps of a CSV table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplingMode {
    /// One row per distinct sample timestamp
    Changes,
    /// A fixed grid with this period in seconds
    Fixed(f64),
}

/// Options for [`export`].
///
/// # Examples
///
/// ```
/// use robolog::export::{ExportFormat, ExportOptions, SamplingMode};
///
/// let options = ExportOptions::new(ExportFormat::CsvTable)
///     .prefixes("/Drive, /DSLog")
///     .sampling_mode(SamplingMode::Fixed(0.02));
/// assert_eq!(options.prefixes, "/Drive, /DSLog");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub sampling_mode: SamplingMode,
    /// Comma-separated key prefixes; empty selects every field
    pub prefixes: String,
    pub include_array_items: bool,
    /// Free-text header of exported WPILOG files
    pub extra_header: String,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            sampling_mode: SamplingMode::Changes,
            prefixes: String::new(),
            include_array_items: false,
            extra_header: DEFAULT_EXTRA_HEADER.to_string(),
        }
    }

    pub fn sampling_mode(mut self, mode: SamplingMode) -> Self {
        self.sampling_mode = mode;
        self
    }

    pub fn prefixes(mut self, prefixes: impl Into<String>) -> Self {
        self.prefixes = prefixes.into();
        self
    }

    pub fn include_array_items(mut self, enabled: bool) -> Self {
        self.include_array_items = enabled;
        self
    }

    pub fn extra_header(mut self, header: impl Into<String>) -> Self {
        self.extra_header = header.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    Text(String),
    Bytes(Vec<u8>),
}

/// Selects fields per `options` and runs the matching generator.
pub fn export(log: &LogStore, options: &ExportOptions) -> Result<ExportOutput> {
    let fields = select_fields(log, &options.prefixes, options.include_array_items);

    Ok(match options.format {
        ExportFormat::CsvTable => {
            let period = match options.sampling_mode {
                SamplingMode::Changes => None,
                SamplingMode::Fixed(period) if period.is_finite() && period > 0.0 => Some(period),
                SamplingMode::Fixed(period) => {
                    return Err(Error::Other(format!("Invalid sampling period {}", period)))
                }
            };
            ExportOutput::Text(generate_csv_table(log, &fields, period))
        }
        ExportFormat::CsvList => ExportOutput::Text(generate_csv_list(log, &fields)),
        ExportFormat::Wpilog => {
            ExportOutput::Bytes(generate_wpilog(log, &fields, &options.extra_header))
        }
    })
}

fn collect_fields(nodes: &BTreeMap<String, FieldTreeNode>, output: &mut Vec<String>) {
    for node in nodes.values() {
        if let Some(key) = &node.full_key {
            output.push(key.clone());
        }
        collect_fields(&node.children, output);
    }
}

fn key_segments(key: &str) -> Vec<&str> {
    key.split(['/', ':']).filter(|s| !s.is_empty()).collect()
}

/// Field keys in depth-first field tree order, filtered by prefix.
///
/// A prefix matches a key when its `/`- or `:`-separated segments equal the
/// key's leading segments, ignoring case. Keys are listed once, in the order
/// of the first prefix that matches them.
pub fn select_fields(log: &LogStore, prefixes: &str, include_array_items: bool) -> Vec<String> {
    let mut fields = Vec::new();
    collect_fields(&log.get_field_tree(include_array_items, ""), &mut fields);

    let prefixes: Vec<Vec<&str>> = prefixes
        .split(',')
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(key_segments)
        .collect();
    if prefixes.is_empty() {
        return fields;
    }

    let mut selected: Vec<String> = Vec::new();
    for prefix in &prefixes {
        for field in &fields {
            let segments = key_segments(field);
            let matches = segments.len() >= prefix.len()
                && prefix
                    .iter()
                    .zip(&segments)
                    .all(|(p, s)| p.to_lowercase() == s.to_lowercase());
            if matches && !selected.contains(field) {
                selected.push(field.clone());
            }
        }
    }
    selected
}

/// Rounds to the nearest microsecond, normalizing negative zero.
pub fn clean_float(value: f64) -> f64 {
    let output = (value * 1e6).round() / 1e6;
    if output == 0.0 {
        0.0
    } else {
        output
    }
}

fn fixed_grid(timestamps: &[f64], period: f64) -> Vec<f64> {
    let (Some(&first), Some(&last)) = (timestamps.first(), timestamps.last()) else {
        return Vec::new();
    };
    if period.is_nan() || period <= 0.0 {
        return Vec::new();
    }

    let start = (first / period).floor() * period;
    let mut grid = Vec::new();
    for step in 0u64.. {
        let timestamp = start + step as f64 * period;
        if timestamp > last {
            break;
        }
        grid.push(clean_float(timestamp));
    }
    grid
}

fn number_text(value: f64) -> String {
    if !value.is_finite() {
        "null".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

fn string_text(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn list_text<T>(items: &[T], text: impl Fn(&T) -> String) -> String {
    let items: Vec<String> = items.iter().map(text).collect();
    format!("[{}]", items.join(","))
}

/// Text form of a value: bytes as `[0x01,0xff]`, everything else as JSON.
/// A missing value is `null`.
pub fn log_value_text(value: Option<&LogValue>) -> String {
    match value {
        None => "null".to_string(),
        Some(LogValue::Raw(bytes)) => list_text(bytes, |b| format!("0x{:02x}", b)),
        Some(LogValue::Boolean(b)) => b.to_string(),
        Some(LogValue::Number(n)) => number_text(*n),
        Some(LogValue::String(s)) => string_text(s),
        Some(LogValue::BooleanArray(items)) => list_text(items, bool::to_string),
        Some(LogValue::NumberArray(items)) => list_text(items, |n| number_text(*n)),
        Some(LogValue::StringArray(items)) => list_text(items, |s| string_text(s)),
    }
}

fn cell_text(value: Option<&LogValue>) -> String {
    log_value_text(value).replace(',', ";")
}

/// Dense table: a `Timestamp` column followed by one column per field.
///
/// Rows are every sample timestamp of the selection, or a fixed grid when
/// `sampling_period` is set. Each cell holds the field's value as of the row.
pub fn generate_csv_table(log: &LogStore, fields: &[String], sampling_period: Option<f64>) -> String {
    let mut timestamps = log.get_timestamps(fields);
    if let Some(period) = sampling_period {
        timestamps = fixed_grid(&timestamps, period);
    }

    let columns: Vec<_> = fields.iter().map(|key| log.get_field(key)).collect();

    let mut lines = Vec::with_capacity(timestamps.len() + 1);
    lines.push(
        std::iter::once("Timestamp")
            .chain(fields.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(","),
    );
    for &timestamp in &timestamps {
        let mut row = vec![number_text(timestamp)];
        row.extend(
            columns
                .iter()
                .map(|field| cell_text(field.and_then(|f| f.value_at(timestamp)))),
        );
        lines.push(row.join(","));
    }
    lines.join("\n")
}

/// Sparse list of `Timestamp,Key,Value` rows, one per stored sample,
/// ordered by timestamp.
pub fn generate_csv_list(log: &LogStore, fields: &[String]) -> String {
    let mut rows: Vec<(f64, &str, String)> = Vec::new();
    for key in fields {
        let Some(field) = log.get_field(key) else {
            continue;
        };
        for (&timestamp, value) in field.timestamps().iter().zip(field.values()) {
            rows.push((timestamp, key.as_str(), cell_text(Some(value))));
        }
    }
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));

    std::iter::once("Timestamp,Key,Value".to_string())
        .chain(
            rows.into_iter()
                .map(|(timestamp, key, value)| format!("{},{},{}", number_text(timestamp), key, value)),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

/// Re-encodes the selected fields as a WPILOG container.
///
/// The n-th field of `fields` becomes entry `n + 1`, started at time zero.
pub fn generate_wpilog(log: &LogStore, fields: &[String], extra_header: &str) -> Vec<u8> {
    let mut writer = DataLogWriter::new(extra_header);

    for (index, key) in fields.iter().enumerate() {
        let Some(field) = log.get_field(key) else {
            continue;
        };
        let entry = index as u32 + 1;
        writer.add(EncoderRecord::control_start(
            0,
            &StartRecordData {
                entry,
                name: key.clone(),
                type_name: field.kind().wpilog_type().to_string(),
                metadata: String::new(),
            },
        ));

        for (&timestamp, value) in field.timestamps().iter().zip(field.values()) {
            let timestamp = secs_to_micros(timestamp);
            writer.add(match value {
                LogValue::Raw(bytes) => EncoderRecord::raw(entry, timestamp, bytes),
                LogValue::Boolean(b) => EncoderRecord::boolean(entry, timestamp, *b),
                LogValue::Number(n) => EncoderRecord::double(entry, timestamp, *n),
                LogValue::String(s) => EncoderRecord::string(entry, timestamp, s),
                LogValue::BooleanArray(items) => EncoderRecord::boolean_array(entry, timestamp, items),
                LogValue::NumberArray(items) => EncoderRecord::double_array(entry, timestamp, items),
                LogValue::StringArray(items) => EncoderRecord::string_array(entry, timestamp, items.as_slice()),
            });
        }
    }

    writer.encode()
}
