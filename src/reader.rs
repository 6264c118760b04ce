//! High-level API for decoding WPILOG files into a [`LogStore`].

use log::debug;
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::Path;

use crate::datalog::{DataLogReader, StartRecordData};
use crate::error::{Error, Result};
use crate::log::LogStore;
use crate::models::LoggableType;
use crate::schemas::find_schema_decoder;

/// Bytes of a log, either owned or memory-mapped from disk.
pub enum LogBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for LogBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            LogBytes::Owned(data) => data.as_slice(),
            LogBytes::Mapped(mmap) => &mmap[..],
        }
    }
}

/// Memory-maps a log file, reporting a missing file as [`Error::FileNotFound`].
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<LogBytes> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(err),
    })?;
    if file.metadata()?.len() == 0 {
        // Zero-length files cannot be mapped on every platform
        return Ok(LogBytes::Owned(Vec::new()));
    }
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(LogBytes::Mapped(mmap))
}

/// Field kind pre-created for a WPILOG entry type tag.
pub fn loggable_type_for(type_name: &str) -> LoggableType {
    match type_name {
        "boolean" => LoggableType::Boolean,
        "int" | "int64" | "float" | "double" => LoggableType::Number,
        "string" | "json" => LoggableType::String,
        "boolean[]" => LoggableType::BooleanArray,
        "int64[]" | "float[]" | "double[]" => LoggableType::NumberArray,
        "string[]" => LoggableType::StringArray,
        _ => LoggableType::Raw,
    }
}

fn validate(data: &[u8]) -> Result<()> {
    let reader = DataLogReader::new(data);
    if !reader.has_valid_header() {
        return Err(Error::InvalidFormat("Not a valid WPILOG file".to_string()));
    }
    if !reader.is_supported_version() {
        return Err(Error::UnsupportedVersion(format!(
            "WPILOG version {:#06x}",
            reader.get_version()
        )));
    }
    Ok(())
}

/// A reader for WPILOG files that decodes every entry into a [`LogStore`].
///
/// # Examples
///
/// ```no_run
/// use robolog::WpilogReader;
///
/// let reader = WpilogReader::from_file("data.wpilog")?;
/// let log = reader.read_log()?;
/// println!("Read {} fields", log.get_field_count());
/// # Ok::<(), robolog::Error>(())
/// ```
pub struct WpilogReader {
    data: LogBytes,
    decode_schemas: bool,
}

impl WpilogReader {
    /// Create a new WPILOG reader from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a WPILOG file, or
    /// has an unsupported version.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = load_file(path)?;
        validate(&data)?;
        Ok(Self {
            data,
            decode_schemas: true,
        })
    }

    /// Create a new WPILOG reader from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        validate(&data)?;
        Ok(Self {
            data: LogBytes::Owned(data),
            decode_schemas: true,
        })
    }

    /// Get the WPILOG file version (e.g., 0x0100 for version 1.0).
    pub fn version(&self) -> u16 {
        DataLogReader::new(&self.data).get_version()
    }

    /// Get the extra header string from the WPILOG file.
    pub fn extra_header(&self) -> String {
        DataLogReader::new(&self.data).get_extra_header()
    }

    /// Decode every record into a new [`LogStore`].
    ///
    /// Record timestamps (integer microseconds) are stored as seconds.
    ///
    /// # Errors
    ///
    /// Any malformed record aborts the whole decode with [`Error::ParseError`].
    pub fn read_log(&self) -> Result<LogStore> {
        let mut log = LogStore::new();
        self.decode_into(&mut log).map_err(Error::parse)?;
        Ok(log)
    }

    /// Get a low-level reader for custom record processing.
    pub fn low_level_reader(&self) -> DataLogReader<'_> {
        DataLogReader::new(&self.data)
    }

    fn decode_into(&self, log: &mut LogStore) -> anyhow::Result<()> {
        let reader = DataLogReader::new(&self.data);
        let mut entries: HashMap<u32, StartRecordData> = HashMap::new();

        for record_result in reader.records()? {
            let record = record_result?;

            if record.is_control() {
                if record.is_start() {
                    let start = record.get_start_data()?;
                    log.create_field(&start.name, loggable_type_for(&start.type_name));
                    entries.insert(start.entry, start);
                } else if record.is_finish() {
                    entries.remove(&record.get_finish_entry()?);
                } else if record.is_set_metadata() {
                    let update = record.get_set_metadata_data()?;
                    if let Some(entry) = entries.get_mut(&update.entry) {
                        entry.metadata = update.metadata;
                    }
                }
                continue;
            }

            let Some(entry) = entries.get(&record.entry) else {
                debug!("Skipping record for unknown entry {}", record.entry);
                continue;
            };
            let key = entry.name.as_str();
            let timestamp = record.timestamp_secs();

            match entry.type_name.as_str() {
                "boolean" => log.put_boolean(key, timestamp, record.get_boolean()?),
                "int" | "int64" => log.put_number(key, timestamp, record.get_integer()? as f64),
                "float" => log.put_number(key, timestamp, record.get_float()? as f64),
                "double" => log.put_number(key, timestamp, record.get_double()?),
                "string" | "json" => log.put_string(key, timestamp, record.get_string()),
                "boolean[]" => log.put_boolean_array(key, timestamp, record.get_boolean_array()),
                "int64[]" => log.put_number_array(
                    key,
                    timestamp,
                    record.get_integer_array()?.into_iter().map(|v| v as f64).collect(),
                ),
                "float[]" => log.put_number_array(
                    key,
                    timestamp,
                    record.get_float_array()?.into_iter().map(f64::from).collect(),
                ),
                "double[]" => log.put_number_array(key, timestamp, record.get_double_array()?),
                "string[]" => log.put_string_array(key, timestamp, record.get_string_array()?),
                type_name => {
                    log.put_raw(key, timestamp, record.get_raw());
                    if self.decode_schemas {
                        if let Some(decoder) = find_schema_decoder(type_name) {
                            decoder(log, key, timestamp, record.data)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Decode a WPILOG buffer with default options.
pub fn decode_wpilog(data: &[u8]) -> Result<LogStore> {
    WpilogReader::from_bytes(data.to_vec())?.read_log()
}

/// Builder for configuring WPILOG decoding options.
///
/// # Examples
///
/// ```no_run
/// use robolog::WpilogReaderBuilder;
///
/// let reader = WpilogReaderBuilder::new()
///     .decode_schemas(false)
///     .from_file("data.wpilog")?;
/// let log = reader.read_log()?;
/// # Ok::<(), robolog::Error>(())
/// ```
pub struct WpilogReaderBuilder {
    decode_schemas: bool,
}

impl WpilogReaderBuilder {
    /// Create a new reader builder with default options.
    pub fn new() -> Self {
        Self {
            decode_schemas: true,
        }
    }

    /// Expand raw entries with a known schema type into child fields.
    ///
    /// Default is true.
    pub fn decode_schemas(mut self, enabled: bool) -> Self {
        self.decode_schemas = enabled;
        self
    }

    /// Build a reader from a file path.
    pub fn from_file<P: AsRef<Path>>(self, path: P) -> Result<WpilogReader> {
        let mut reader = WpilogReader::from_file(path)?;
        reader.decode_schemas = self.decode_schemas;
        Ok(reader)
    }

    /// Build a reader from raw bytes.
    pub fn from_bytes(self, data: Vec<u8>) -> Result<WpilogReader> {
        let mut reader = WpilogReader::from_bytes(data)?;
        reader.decode_schemas = self.decode_schemas;
        Ok(reader)
    }
}

impl Default for WpilogReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
