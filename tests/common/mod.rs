//! Byte-buffer builders for every log format the crate decodes.
#![allow(dead_code)]

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

fn push_lp_string(data: &mut Vec<u8>, value: &str) {
    data.write_u32::<LittleEndian>(value.len() as u32).unwrap();
    data.extend_from_slice(value.as_bytes());
}

/// Builder for WPILOG containers. Timestamps are integer microseconds.
pub struct WpilogBuilder {
    data: Vec<u8>,
}

impl WpilogBuilder {
    /// Version 1.0, empty extra header
    pub fn new() -> Self {
        Self::with_header(0x0100, "")
    }

    pub fn with_header(version: u16, extra_header: &str) -> Self {
        let mut data = b"WPILOG".to_vec();
        data.write_u16::<LittleEndian>(version).unwrap();
        push_lp_string(&mut data, extra_header);
        Self { data }
    }

    pub fn start_record(
        mut self,
        timestamp: u64,
        entry_id: u32,
        name: &str,
        type_str: &str,
        metadata: &str,
    ) -> Self {
        let mut payload = vec![0];
        payload.write_u32::<LittleEndian>(entry_id).unwrap();
        push_lp_string(&mut payload, name);
        push_lp_string(&mut payload, type_str);
        push_lp_string(&mut payload, metadata);
        self.write_record(0, timestamp, &payload);
        self
    }

    pub fn finish_record(mut self, timestamp: u64, entry_id: u32) -> Self {
        let mut payload = vec![1];
        payload.write_u32::<LittleEndian>(entry_id).unwrap();
        self.write_record(0, timestamp, &payload);
        self
    }

    pub fn set_metadata_record(mut self, timestamp: u64, entry_id: u32, metadata: &str) -> Self {
        let mut payload = vec![2];
        payload.write_u32::<LittleEndian>(entry_id).unwrap();
        push_lp_string(&mut payload, metadata);
        self.write_record(0, timestamp, &payload);
        self
    }

    pub fn boolean_record(self, entry_id: u32, timestamp: u64, value: bool) -> Self {
        self.raw_record(entry_id, timestamp, &[value as u8])
    }

    pub fn int64_record(self, entry_id: u32, timestamp: u64, value: i64) -> Self {
        self.raw_record(entry_id, timestamp, &value.to_le_bytes())
    }

    pub fn float_record(self, entry_id: u32, timestamp: u64, value: f32) -> Self {
        self.raw_record(entry_id, timestamp, &value.to_le_bytes())
    }

    pub fn double_record(self, entry_id: u32, timestamp: u64, value: f64) -> Self {
        self.raw_record(entry_id, timestamp, &value.to_le_bytes())
    }

    pub fn string_record(self, entry_id: u32, timestamp: u64, value: &str) -> Self {
        self.raw_record(entry_id, timestamp, value.as_bytes())
    }

    pub fn boolean_array_record(self, entry_id: u32, timestamp: u64, values: &[bool]) -> Self {
        let payload: Vec<u8> = values.iter().map(|&b| b as u8).collect();
        self.raw_record(entry_id, timestamp, &payload)
    }

    pub fn int64_array_record(self, entry_id: u32, timestamp: u64, values: &[i64]) -> Self {
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.raw_record(entry_id, timestamp, &payload)
    }

    pub fn float_array_record(self, entry_id: u32, timestamp: u64, values: &[f32]) -> Self {
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.raw_record(entry_id, timestamp, &payload)
    }

    pub fn double_array_record(self, entry_id: u32, timestamp: u64, values: &[f64]) -> Self {
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.raw_record(entry_id, timestamp, &payload)
    }

    pub fn string_array_record(self, entry_id: u32, timestamp: u64, values: &[&str]) -> Self {
        let mut payload = Vec::new();
        payload.write_u32::<LittleEndian>(values.len() as u32).unwrap();
        for value in values {
            push_lp_string(&mut payload, value);
        }
        self.raw_record(entry_id, timestamp, &payload)
    }

    pub fn raw_record(mut self, entry_id: u32, timestamp: u64, data: &[u8]) -> Self {
        self.write_record(entry_id, timestamp, data);
        self
    }

    /// Appends arbitrary bytes after the last record.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.data.extend_from_slice(data);
        self
    }

    fn write_record(&mut self, entry_id: u32, timestamp: u64, payload: &[u8]) {
        let entry_len = min_bytes(entry_id as u64, 4);
        let size_len = min_bytes(payload.len() as u64, 4);
        let timestamp_len = min_bytes(timestamp, 8);

        self.data.push(
            ((entry_len - 1) | ((size_len - 1) << 2) | ((timestamp_len - 1) << 4)) as u8,
        );
        self.data.extend_from_slice(&(entry_id as u64).to_le_bytes()[..entry_len]);
        self.data.extend_from_slice(&(payload.len() as u64).to_le_bytes()[..size_len]);
        self.data.extend_from_slice(&timestamp.to_le_bytes()[..timestamp_len]);
        self.data.extend_from_slice(payload);
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for WpilogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn min_bytes(value: u64, max: usize) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).clamp(1, max)
}

/// Builder for RLOG buffers. All multi-byte fields are big-endian.
pub struct RlogBuilder {
    data: Vec<u8>,
}

impl RlogBuilder {
    /// First buffer of a session: revision byte then one skipped byte.
    pub fn new() -> Self {
        Self::with_revision(1)
    }

    pub fn with_revision(revision: u8) -> Self {
        Self {
            data: vec![revision, 0],
        }
    }

    /// Later buffer of a session: one skipped byte.
    pub fn continuation() -> Self {
        Self { data: vec![0] }
    }

    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.data.write_f64::<BigEndian>(timestamp).unwrap();
        self
    }

    pub fn key(mut self, id: i16, name: &str) -> Self {
        self.data.push(1);
        self.data.write_i16::<BigEndian>(id).unwrap();
        self.push_string(name);
        self
    }

    fn value_header(&mut self, id: i16, tag: u8) {
        self.data.push(2);
        self.data.write_i16::<BigEndian>(id).unwrap();
        self.data.push(tag);
    }

    fn push_string(&mut self, value: &str) {
        self.data.write_i16::<BigEndian>(value.len() as i16).unwrap();
        self.data.extend_from_slice(value.as_bytes());
    }

    pub fn clear(mut self, id: i16) -> Self {
        self.value_header(id, 0);
        self
    }

    pub fn boolean(mut self, id: i16, value: bool) -> Self {
        self.value_header(id, 1);
        self.data.push(value as u8);
        self
    }

    pub fn boolean_array(mut self, id: i16, values: &[bool]) -> Self {
        self.value_header(id, 2);
        self.data.write_i16::<BigEndian>(values.len() as i16).unwrap();
        self.data.extend(values.iter().map(|&b| b as u8));
        self
    }

    pub fn int(mut self, id: i16, value: i32) -> Self {
        self.value_header(id, 3);
        self.data.write_i32::<BigEndian>(value).unwrap();
        self
    }

    pub fn int_array(mut self, id: i16, values: &[i32]) -> Self {
        self.value_header(id, 4);
        self.data.write_i16::<BigEndian>(values.len() as i16).unwrap();
        for &value in values {
            self.data.write_i32::<BigEndian>(value).unwrap();
        }
        self
    }

    pub fn double(mut self, id: i16, value: f64) -> Self {
        self.value_header(id, 5);
        self.data.write_f64::<BigEndian>(value).unwrap();
        self
    }

    pub fn double_array(mut self, id: i16, values: &[f64]) -> Self {
        self.value_header(id, 6);
        self.data.write_i16::<BigEndian>(values.len() as i16).unwrap();
        for &value in values {
            self.data.write_f64::<BigEndian>(value).unwrap();
        }
        self
    }

    pub fn string(mut self, id: i16, value: &str) -> Self {
        self.value_header(id, 7);
        self.push_string(value);
        self
    }

    pub fn string_array(mut self, id: i16, values: &[&str]) -> Self {
        self.value_header(id, 8);
        self.data.write_i16::<BigEndian>(values.len() as i16).unwrap();
        for value in values {
            self.push_string(value);
        }
        self
    }

    pub fn byte(mut self, id: i16, value: u8) -> Self {
        self.value_header(id, 9);
        self.data.push(value);
        self
    }

    pub fn byte_array(mut self, id: i16, values: &[u8]) -> Self {
        self.value_header(id, 10);
        self.data.write_i16::<BigEndian>(values.len() as i16).unwrap();
        self.data.extend_from_slice(values);
        self
    }

    /// Ends the current cycle.
    pub fn end(mut self) -> Self {
        self.data.push(0);
        self
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.data.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for RlogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames a buffer with a big-endian length prefix, as sent over the live socket.
pub fn frame(buffer: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(buffer.len() + 4);
    data.write_i32::<BigEndian>(buffer.len() as i32).unwrap();
    data.extend_from_slice(buffer);
    data
}

/// Raw status fields of one DS log record.
#[derive(Debug, Clone, Copy, Default)]
pub struct DsStatus {
    pub trip_time: u8,
    pub packet_loss: i8,
    pub battery: u16,
    pub cpu: u8,
    /// Active-low status bits
    pub mask: u8,
    pub can: u8,
    pub wifi_db: u8,
    pub wifi_mb: u16,
}

fn write_lv_header(data: &mut Vec<u8>, version: i32, seconds: i64, fractional: u64) {
    data.write_i32::<BigEndian>(version).unwrap();
    data.write_i64::<BigEndian>(seconds).unwrap();
    data.write_u64::<BigEndian>(fractional).unwrap();
}

/// Builder for `.dslog` files.
pub struct DsLogBuilder {
    data: Vec<u8>,
}

impl DsLogBuilder {
    pub fn new() -> Self {
        Self::with_version(4)
    }

    pub fn with_version(version: i32) -> Self {
        let mut data = Vec::new();
        write_lv_header(&mut data, version, 3_800_000_000, 0);
        Self { data }
    }

    /// Appends one record: status block, padding, vendor id and vendor payload.
    pub fn record(mut self, status: DsStatus, pd_id: u8, pd_data: &[u8]) -> Self {
        self.data.push(status.trip_time);
        self.data.write_i8(status.packet_loss).unwrap();
        self.data.write_u16::<BigEndian>(status.battery).unwrap();
        self.data.push(status.cpu);
        self.data.push(status.mask);
        self.data.push(status.can);
        self.data.push(status.wifi_db);
        self.data.write_u16::<BigEndian>(status.wifi_mb).unwrap();
        self.data.extend_from_slice(&[0, 0, 0]);
        self.data.push(pd_id);
        self.data.push(0);
        self.data.extend_from_slice(pd_data);
        self
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.data.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for DsLogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `.dsevents` files.
pub struct DsEventsBuilder {
    data: Vec<u8>,
}

impl DsEventsBuilder {
    pub fn new(seconds: i64, fractional: u64) -> Self {
        let mut data = Vec::new();
        write_lv_header(&mut data, 4, seconds, fractional);
        Self { data }
    }

    pub fn event(mut self, seconds: i64, fractional: u64, text: &str) -> Self {
        self.data.write_i64::<BigEndian>(seconds).unwrap();
        self.data.write_u64::<BigEndian>(fractional).unwrap();
        self.data.write_i32::<BigEndian>(text.len() as i32).unwrap();
        self.data.extend_from_slice(text.as_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wpilog_header() {
        let data = WpilogBuilder::with_header(0x0100, "hi").build();
        assert_eq!(&data[0..6], b"WPILOG");
        assert_eq!(&data[6..8], &[0x00, 0x01]);
        assert_eq!(&data[8..12], &[2, 0, 0, 0]);
        assert_eq!(&data[12..], b"hi");
    }

    #[test]
    fn test_min_bytes() {
        assert_eq!(min_bytes(0, 4), 1);
        assert_eq!(min_bytes(255, 4), 1);
        assert_eq!(min_bytes(256, 4), 2);
        assert_eq!(min_bytes(u64::MAX, 8), 8);
    }

    #[test]
    fn test_ds_record_length() {
        let header_len = DsLogBuilder::new().build().len();
        let data = DsLogBuilder::new()
            .record(DsStatus::default(), 0, &[])
            .build();
        assert_eq!(header_len, 20);
        assert_eq!(data.len(), 35);
    }
}
