//! Low-level reader for the WPILOG container format.
//!
//! Layout: `"WPILOG"`, a little-endian `u16` version, a `u32` length-prefixed
//! extra header string, then records. Each record starts with a bitfield byte
//! giving the byte widths of the entry id (1-4), payload size (1-4) and
//! timestamp (1-8) that follow it.

use anyhow::{anyhow, bail, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

pub const HEADER_STRING: &[u8; 6] = b"WPILOG";
pub const HEADER_VERSION: u16 = 0x0100;
pub const SUPPORTED_VERSIONS: [u16; 1] = [HEADER_VERSION];

pub const CONTROL_ENTRY: u32 = 0;
pub const CONTROL_START: u8 = 0;
pub const CONTROL_FINISH: u8 = 1;
pub const CONTROL_SET_METADATA: u8 = 2;

const FILE_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct StartRecordData {
    pub entry: u32,
    pub name: String,
    pub type_name: String,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecordData {
    pub entry: u32,
    pub metadata: String,
}

/// One record, borrowing its payload from the log buffer.
#[derive(Debug, Clone)]
pub struct DataLogRecord<'a> {
    pub entry: u32,
    /// Integer microseconds
    pub timestamp: u64,
    pub data: &'a [u8],
}

/// Reads a `u32` length-prefixed string from a control payload. Invalid UTF-8
/// is replaced rather than rejected.
fn read_prefixed_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let size = cursor.read_u32::<LittleEndian>()? as usize;
    let start = cursor.position() as usize;
    let bytes = cursor
        .get_ref()
        .get(start..start + size)
        .ok_or_else(|| anyhow!("String of {} bytes runs past end of record", size))?;
    cursor.set_position((start + size) as u64);
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

impl<'a> DataLogRecord<'a> {
    pub fn is_control(&self) -> bool {
        self.entry == CONTROL_ENTRY
    }

    fn is_control_of(&self, control_type: u8, min_len: usize) -> bool {
        self.is_control()
            && self.data.len() >= min_len
            && self.data.first() == Some(&control_type)
    }

    pub fn is_start(&self) -> bool {
        self.is_control_of(CONTROL_START, 17)
    }

    pub fn is_finish(&self) -> bool {
        self.is_control_of(CONTROL_FINISH, 5) && self.data.len() == 5
    }

    pub fn is_set_metadata(&self) -> bool {
        self.is_control_of(CONTROL_SET_METADATA, 9)
    }

    /// Timestamp converted to floating-point seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp as f64 / 1_000_000.0
    }

    /// Cursor positioned after the control type byte and entry id.
    fn control_body(&self) -> Result<(u32, Cursor<&'a [u8]>)> {
        let mut cursor = Cursor::new(self.data);
        cursor.set_position(1);
        let entry = cursor.read_u32::<LittleEndian>()?;
        Ok((entry, cursor))
    }

    pub fn get_start_data(&self) -> Result<StartRecordData> {
        if !self.is_start() {
            bail!("Not a start record");
        }
        let (entry, mut cursor) = self.control_body()?;
        Ok(StartRecordData {
            entry,
            name: read_prefixed_string(&mut cursor)?,
            type_name: read_prefixed_string(&mut cursor)?,
            metadata: read_prefixed_string(&mut cursor)?,
        })
    }

    pub fn get_finish_entry(&self) -> Result<u32> {
        if !self.is_finish() {
            bail!("Not a finish record");
        }
        Ok(self.control_body()?.0)
    }

    pub fn get_set_metadata_data(&self) -> Result<MetadataRecordData> {
        if !self.is_set_metadata() {
            bail!("Not a set metadata record");
        }
        let (entry, mut cursor) = self.control_body()?;
        Ok(MetadataRecordData {
            entry,
            metadata: read_prefixed_string(&mut cursor)?,
        })
    }

    fn fixed<const N: usize>(&self, type_name: &str) -> Result<[u8; N]> {
        self.data.try_into().map_err(|_| {
            anyhow!(
                "Expected {} bytes for {}, got {}",
                N,
                type_name,
                self.data.len()
            )
        })
    }

    fn elements<const N: usize>(&self, type_name: &str) -> Result<impl Iterator<Item = [u8; N]> + 'a> {
        if self.data.len() % N != 0 {
            bail!(
                "Payload of {} bytes is not a whole number of {} elements",
                self.data.len(),
                type_name
            );
        }
        Ok(self.data.chunks_exact(N).map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            bytes
        }))
    }

    pub fn get_raw(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn get_boolean(&self) -> Result<bool> {
        let [byte] = self.fixed::<1>("boolean")?;
        Ok(byte != 0)
    }

    pub fn get_integer(&self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.fixed("int64")?))
    }

    pub fn get_float(&self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.fixed("float")?))
    }

    pub fn get_double(&self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.fixed("double")?))
    }

    pub fn get_string(&self) -> String {
        String::from_utf8_lossy(self.data).into_owned()
    }

    pub fn get_boolean_array(&self) -> Vec<bool> {
        self.data.iter().map(|&byte| byte != 0).collect()
    }

    pub fn get_integer_array(&self) -> Result<Vec<i64>> {
        Ok(self.elements::<8>("int64")?.map(i64::from_le_bytes).collect())
    }

    pub fn get_float_array(&self) -> Result<Vec<f32>> {
        Ok(self.elements::<4>("float")?.map(f32::from_le_bytes).collect())
    }

    pub fn get_double_array(&self) -> Result<Vec<f64>> {
        Ok(self.elements::<8>("double")?.map(f64::from_le_bytes).collect())
    }

    /// A `u32` count followed by that many length-prefixed strings.
    pub fn get_string_array(&self) -> Result<Vec<String>> {
        let mut cursor = Cursor::new(self.data);
        let count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| anyhow!("Not a string array"))? as usize;
        // Every string needs at least its 4-byte length
        if count > (self.data.len() - 4) / 4 {
            bail!("String array count {} exceeds payload size", count);
        }
        (0..count).map(|_| read_prefixed_string(&mut cursor)).collect()
    }
}

pub struct DataLogReader<'a> {
    data: &'a [u8],
}

impl<'a> DataLogReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn has_valid_header(&self) -> bool {
        self.data.len() >= FILE_HEADER_LEN && self.data.starts_with(HEADER_STRING)
    }

    pub fn is_supported_version(&self) -> bool {
        SUPPORTED_VERSIONS.contains(&self.get_version())
    }

    pub fn is_valid(&self) -> bool {
        self.has_valid_header() && self.is_supported_version()
    }

    /// Version field, or 0 if the buffer is shorter than a file header.
    pub fn get_version(&self) -> u16 {
        if self.data.len() < FILE_HEADER_LEN {
            return 0;
        }
        read_varint(&self.data[6..8], 2) as u16
    }

    fn extra_header_bytes(&self) -> Option<&'a [u8]> {
        if self.data.len() < FILE_HEADER_LEN {
            return None;
        }
        let size = read_varint(&self.data[8..12], 4) as usize;
        self.data.get(FILE_HEADER_LEN..FILE_HEADER_LEN + size)
    }

    /// Free-form header text, empty if it runs past the end of the data.
    pub fn get_extra_header(&self) -> String {
        self.extra_header_bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    pub fn records(&self) -> Result<DataLogIterator<'a>> {
        if !self.is_valid() {
            bail!("Not a valid WPILOG file");
        }
        let extra_header_size = read_varint(&self.data[8..12], 4) as usize;
        Ok(DataLogIterator {
            data: self.data,
            pos: FILE_HEADER_LEN + extra_header_size,
        })
    }
}

/// Iterates records until the data runs out. A truncated trailing record
/// ends the iteration.
pub struct DataLogIterator<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Widths of the entry id, payload size and timestamp fields.
fn field_widths(header_byte: u8) -> (usize, usize, usize) {
    (
        usize::from(header_byte & 0x3) + 1,
        usize::from((header_byte >> 2) & 0x3) + 1,
        usize::from((header_byte >> 4) & 0x7) + 1,
    )
}

impl<'a> Iterator for DataLogIterator<'a> {
    type Item = Result<DataLogRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.get(self.pos..)?;
        let (&header_byte, fields) = remaining.split_first()?;
        let (entry_len, size_len, timestamp_len) = field_widths(header_byte);
        let header_len = 1 + entry_len + size_len + timestamp_len;
        if remaining.len() < header_len {
            return None;
        }

        let entry = read_varint(fields, entry_len) as u32;
        let size = read_varint(&fields[entry_len..], size_len) as usize;
        let timestamp = read_varint(&fields[entry_len + size_len..], timestamp_len);
        let data = remaining.get(header_len..header_len + size)?;

        self.pos += header_len + size;
        Some(Ok(DataLogRecord {
            entry,
            timestamp,
            data,
        }))
    }
}

/// Little-endian integer of `len` bytes.
pub(crate) fn read_varint(data: &[u8], len: usize) -> u64 {
    data.iter()
        .take(len)
        .enumerate()
        .fold(0u64, |val, (i, &byte)| val | (byte as u64) << (i * 8))
}
