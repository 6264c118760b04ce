//! Writer for the WPILOG container format.

use crate::datalog::{
    StartRecordData, CONTROL_ENTRY, CONTROL_FINISH, CONTROL_SET_METADATA, CONTROL_START,
    HEADER_STRING, HEADER_VERSION,
};

/// A record waiting to be encoded. Timestamps are integer microseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderRecord {
    pub entry: u32,
    pub timestamp: u64,
    pub data: Vec<u8>,
}

fn put_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_le_bytes());
}

fn put_string(data: &mut Vec<u8>, value: &str) {
    put_u32(data, value.len() as u32);
    data.extend_from_slice(value.as_bytes());
}

impl EncoderRecord {
    pub fn new(entry: u32, timestamp: u64, data: Vec<u8>) -> Self {
        Self {
            entry,
            timestamp,
            data,
        }
    }

    pub fn control_start(timestamp: u64, start: &StartRecordData) -> Self {
        let mut data = Vec::with_capacity(
            17 + start.name.len() + start.type_name.len() + start.metadata.len(),
        );
        data.push(CONTROL_START);
        put_u32(&mut data, start.entry);
        put_string(&mut data, &start.name);
        put_string(&mut data, &start.type_name);
        put_string(&mut data, &start.metadata);
        Self::new(CONTROL_ENTRY, timestamp, data)
    }

    pub fn control_finish(timestamp: u64, entry: u32) -> Self {
        let mut data = Vec::with_capacity(5);
        data.push(CONTROL_FINISH);
        put_u32(&mut data, entry);
        Self::new(CONTROL_ENTRY, timestamp, data)
    }

    pub fn control_set_metadata(timestamp: u64, entry: u32, metadata: &str) -> Self {
        let mut data = Vec::with_capacity(9 + metadata.len());
        data.push(CONTROL_SET_METADATA);
        put_u32(&mut data, entry);
        put_string(&mut data, metadata);
        Self::new(CONTROL_ENTRY, timestamp, data)
    }

    pub fn raw(entry: u32, timestamp: u64, value: &[u8]) -> Self {
        Self::new(entry, timestamp, value.to_vec())
    }

    pub fn boolean(entry: u32, timestamp: u64, value: bool) -> Self {
        Self::new(entry, timestamp, vec![u8::from(value)])
    }

    pub fn integer(entry: u32, timestamp: u64, value: i64) -> Self {
        Self::new(entry, timestamp, value.to_le_bytes().to_vec())
    }

    pub fn float(entry: u32, timestamp: u64, value: f32) -> Self {
        Self::new(entry, timestamp, value.to_le_bytes().to_vec())
    }

    pub fn double(entry: u32, timestamp: u64, value: f64) -> Self {
        Self::new(entry, timestamp, value.to_le_bytes().to_vec())
    }

    pub fn string(entry: u32, timestamp: u64, value: &str) -> Self {
        Self::new(entry, timestamp, value.as_bytes().to_vec())
    }

    pub fn boolean_array(entry: u32, timestamp: u64, value: &[bool]) -> Self {
        Self::new(entry, timestamp, value.iter().map(|&b| u8::from(b)).collect())
    }

    pub fn integer_array(entry: u32, timestamp: u64, value: &[i64]) -> Self {
        let data = value.iter().flat_map(|item| item.to_le_bytes()).collect();
        Self::new(entry, timestamp, data)
    }

    pub fn float_array(entry: u32, timestamp: u64, value: &[f32]) -> Self {
        let data = value.iter().flat_map(|item| item.to_le_bytes()).collect();
        Self::new(entry, timestamp, data)
    }

    pub fn double_array(entry: u32, timestamp: u64, value: &[f64]) -> Self {
        let data = value.iter().flat_map(|item| item.to_le_bytes()).collect();
        Self::new(entry, timestamp, data)
    }

    pub fn string_array<S: AsRef<str>>(entry: u32, timestamp: u64, value: &[S]) -> Self {
        let mut data = Vec::new();
        put_u32(&mut data, value.len() as u32);
        for item in value {
            put_string(&mut data, item.as_ref());
        }
        Self::new(entry, timestamp, data)
    }

    /// Header bitfield, the three minimal-width integers, then the payload.
    pub fn encode(&self) -> Vec<u8> {
        let entry_len = min_bytes_for_value(self.entry as u64);
        let size_len = min_bytes_for_value(self.data.len() as u64);
        let timestamp_len = min_bytes_for_value(self.timestamp);

        let header_byte = (((entry_len - 1) & 0x3)
            | (((size_len - 1) & 0x3) << 2)
            | (((timestamp_len - 1) & 0x7) << 4)) as u8;

        let mut output =
            Vec::with_capacity(1 + entry_len + size_len + timestamp_len + self.data.len());
        output.push(header_byte);
        write_varint(&mut output, self.entry as u64, entry_len);
        write_varint(&mut output, self.data.len() as u64, size_len);
        write_varint(&mut output, self.timestamp, timestamp_len);
        output.extend_from_slice(&self.data);
        output
    }
}

/// Minimum number of bytes needed to represent a value (at least one).
pub fn min_bytes_for_value(value: u64) -> usize {
    let significant_bits = 64 - value.leading_zeros() as usize;
    significant_bits.div_ceil(8).max(1)
}

fn write_varint(data: &mut Vec<u8>, value: u64, len: usize) {
    for i in 0..len {
        data.push(((value >> (i * 8)) & 0xFF) as u8);
    }
}

/// Converts floating-point seconds to integer microseconds.
pub fn secs_to_micros(timestamp: f64) -> u64 {
    (timestamp * 1_000_000.0).round().max(0.0) as u64
}

/// Accumulates records and produces a complete WPILOG byte buffer.
///
/// # Examples
///
/// ```
/// use robolog::encoder::{DataLogWriter, EncoderRecord};
/// use robolog::datalog::StartRecordData;
///
/// let mut writer = DataLogWriter::new("example");
/// writer.add(EncoderRecord::control_start(0, &StartRecordData {
///     entry: 1,
///     name: "/Battery".to_string(),
///     type_name: "double".to_string(),
///     metadata: String::new(),
/// }));
/// writer.add(EncoderRecord::double(1, 20_000, 12.4));
///
/// let bytes = writer.encode();
/// assert_eq!(&bytes[0..6], b"WPILOG");
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataLogWriter {
    extra_header: String,
    records: Vec<EncoderRecord>,
}

impl DataLogWriter {
    pub fn new(extra_header: impl Into<String>) -> Self {
        Self {
            extra_header: extra_header.into(),
            records: Vec::new(),
        }
    }

    pub fn add(&mut self, record: EncoderRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(HEADER_STRING);
        data.extend_from_slice(&HEADER_VERSION.to_le_bytes());
        put_string(&mut data, &self.extra_header);
        for record in &self.records {
            data.extend_from_slice(&record.encode());
        }
        data
    }
}
