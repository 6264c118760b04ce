//! Decoders for the driver station's fixed-layout `.dslog` status log and
//! `.dsevents` event log.
//!
//! Both files start with a 20-byte header: a big-endian `i32` version followed
//! by a LabVIEW timestamp (`i64` seconds and `u64` fraction of a second).

use anyhow::{bail, Context};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::log::LogStore;

pub const DS_LOG_VERSION: i32 = 4;
pub const DS_LOG_PERIOD_SECS: f64 = 0.02;

const HEADER_LEN: u64 = 20;
/// Seconds between the LabVIEW epoch and the reference epoch
const LV_EPOCH_OFFSET: f64 = -2_082_826_800.0;
const MAX_BATTERY_VOLTS: f64 = 20.0;

const CTRE_CURRENT_BITS: [usize; 16] = [
    0, 10, 20, 30, 40, 50, 64, 74, 84, 94, 104, 114, 128, 138, 148, 158,
];

const STRIPPED_EVENT_TAGS: [&str; 7] = [
    "<TagVersion>",
    "<time>",
    "<count>",
    "<flags>",
    "<Code>",
    "<location>",
    "<stack>",
];

/// Converts a LabVIEW timestamp to seconds.
pub fn convert_lv_time(seconds: i64, fractional: u64) -> f64 {
    LV_EPOCH_OFFSET + seconds as f64 + fractional as f64 / 2f64.powi(64)
}

/// Power distribution hardware, identified by the vendor byte of a status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerDistributionType {
    Rev,
    Ctre,
    None,
}

impl PowerDistributionType {
    pub fn from_id(id: u8) -> Self {
        match id {
            33 => PowerDistributionType::Rev,
            25 => PowerDistributionType::Ctre,
            _ => PowerDistributionType::None,
        }
    }
}

fn read_version(data: &[u8]) -> i32 {
    Cursor::new(data).read_i32::<BigEndian>().unwrap_or(0)
}

fn read_header_timestamp(data: &[u8]) -> anyhow::Result<f64> {
    let mut cursor = Cursor::new(data);
    cursor.set_position(4);
    let seconds = cursor.read_i64::<BigEndian>().context("Truncated header")?;
    let fractional = cursor.read_u64::<BigEndian>().context("Truncated header")?;
    Ok(convert_lv_time(seconds, fractional))
}

fn unsupported(kind: &str, version: i32) -> Error {
    Error::UnsupportedVersion(format!("{} version {}", kind, version))
}

/// One decoded status record.
#[derive(Debug, Clone, PartialEq)]
pub struct DsLogEntry {
    /// Seconds since the start of the log
    pub timestamp: f64,
    pub trip_time_ms: f64,
    /// Fraction in `[0, 1]`
    pub packet_loss: f64,
    pub battery_volts: f64,
    pub rio_cpu_utilization: f64,
    pub brownout: bool,
    pub watchdog: bool,
    pub ds_teleop: bool,
    pub ds_disabled: bool,
    pub robot_teleop: bool,
    pub robot_auto: bool,
    pub robot_disabled: bool,
    pub can_utilization: f64,
    pub wifi_db: f64,
    pub wifi_mb: f64,
    /// Amps per channel; empty when the hardware is unknown
    pub power_distribution_currents: Vec<f64>,
}

/// Reader for `.dslog` status logs.
///
/// Records carry no timestamp of their own; the n-th record is placed at
/// `n * DS_LOG_PERIOD_SECS`.
pub struct DsLogReader<'a> {
    data: &'a [u8],
}

impl<'a> DsLogReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Version field, or 0 if the buffer is too short to hold one.
    pub fn get_version(&self) -> i32 {
        read_version(self.data)
    }

    pub fn is_supported_version(&self) -> bool {
        self.get_version() == DS_LOG_VERSION
    }

    /// Time the log was opened, in seconds.
    pub fn get_timestamp(&self) -> Result<f64> {
        read_header_timestamp(self.data).map_err(Error::parse)
    }

    /// Decodes every status record.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedVersion`] if the version is not 4, and
    /// [`Error::ParseError`] if a record is cut short.
    pub fn entries(&self) -> Result<Vec<DsLogEntry>> {
        if !self.is_supported_version() {
            return Err(unsupported("DS log", self.get_version()));
        }
        self.read_entries().map_err(Error::parse)
    }

    fn read_entries(&self) -> anyhow::Result<Vec<DsLogEntry>> {
        let mut cursor = Cursor::new(self.data);
        cursor.set_position(HEADER_LEN);

        let mut entries = Vec::new();
        let mut last_battery_volts = 0.0;
        let mut timestamp = 0.0;
        while cursor.position() < self.data.len() as u64 {
            let entry = read_status_record(&mut cursor, timestamp, &mut last_battery_volts)
                .with_context(|| format!("Truncated status record {}", entries.len()))?;
            entries.push(entry);
            timestamp += DS_LOG_PERIOD_SECS;
        }
        Ok(entries)
    }
}

fn read_status_record(
    cursor: &mut Cursor<&[u8]>,
    timestamp: f64,
    last_battery_volts: &mut f64,
) -> anyhow::Result<DsLogEntry> {
    let start = cursor.position();

    let trip_time = cursor.read_u8()?;
    let packet_loss = cursor.read_i8()?;
    let mut battery_volts = f64::from(cursor.read_u16::<BigEndian>()?) / 256.0;
    let rio_cpu = cursor.read_u8()?;
    let mask = cursor.read_u8()?;
    let can = cursor.read_u8()?;
    let wifi_db = cursor.read_u8()?;
    let wifi_mb = cursor.read_u16::<BigEndian>()?;

    // Spikes above a plausible battery voltage are sensor glitches
    if battery_volts > MAX_BATTERY_VOLTS {
        battery_volts = *last_battery_volts;
    } else {
        *last_battery_volts = battery_volts;
    }

    cursor.set_position(start + 13);
    let pd_type = PowerDistributionType::from_id(cursor.read_u8()?);
    cursor.set_position(start + 15);

    let power_distribution_currents = match pd_type {
        PowerDistributionType::Rev => read_rev_currents(cursor)?,
        PowerDistributionType::Ctre => read_ctre_currents(cursor)?,
        PowerDistributionType::None => Vec::new(),
    };

    // Status bits are active-low
    let flag = |bit: u8| (mask & (1 << bit)) == 0;

    Ok(DsLogEntry {
        timestamp,
        trip_time_ms: f64::from(trip_time) * 0.5,
        packet_loss: (f64::from(packet_loss) * 4.0 * 0.01).clamp(0.0, 1.0),
        battery_volts,
        rio_cpu_utilization: f64::from(rio_cpu) * 0.5 * 0.01,
        brownout: flag(7),
        watchdog: flag(6),
        ds_teleop: flag(5),
        ds_disabled: flag(3),
        robot_teleop: flag(2),
        robot_auto: flag(1),
        robot_disabled: flag(0),
        can_utilization: f64::from(can) * 0.5 * 0.01,
        wifi_db: f64::from(wifi_db) * 0.5,
        wifi_mb: f64::from(wifi_mb) / 256.0,
        power_distribution_currents,
    })
}

/// 20 ten-bit channels packed three per little-endian word, then four
/// byte-wide channels. Occupies 32 bytes.
fn read_rev_currents(cursor: &mut Cursor<&[u8]>) -> anyhow::Result<Vec<f64>> {
    let mut words = [0u32; 7];
    for word in words.iter_mut().take(6) {
        *word = cursor.read_u32::<LittleEndian>()?;
    }
    words[6] = u32::from(cursor.read_u16::<BigEndian>()?) << 16;
    cursor.set_position(cursor.position() + 1);

    let mut small_channels = [0u8; 4];
    cursor.read_exact(&mut small_channels)?;
    cursor.set_position(cursor.position() + 1);

    let mut currents: Vec<f64> = (0..20)
        .map(|channel| {
            let word = words[channel / 3];
            let shift = 32 - (channel % 3 + 1) * 10;
            f64::from((word << shift) >> 22) / 8.0
        })
        .collect();
    currents.extend(small_channels.iter().map(|&b| f64::from(b) / 16.0));
    Ok(currents)
}

/// 16 byte-wide channels at fixed bit offsets in a 21-byte LSB-first
/// bitmap, followed by 3 bytes of padding.
fn read_ctre_currents(cursor: &mut Cursor<&[u8]>) -> anyhow::Result<Vec<f64>> {
    let mut bitmap = [0u8; 21];
    cursor.read_exact(&mut bitmap)?;
    cursor.set_position(cursor.position() + 3);

    let bit = |index: usize| (bitmap[index / 8] >> (index % 8)) & 1;
    Ok(CTRE_CURRENT_BITS
        .iter()
        .map(|&offset| {
            let value = (0..8).fold(0u8, |acc, i| acc | (bit(offset + i) << i));
            f64::from(value) / 16.0
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DsEvent {
    /// Seconds since the log was opened
    pub timestamp: f64,
    pub text: String,
}

/// Reader for `.dsevents` event logs.
pub struct DsEventsReader<'a> {
    data: &'a [u8],
}

impl<'a> DsEventsReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn get_version(&self) -> i32 {
        read_version(self.data)
    }

    pub fn is_supported_version(&self) -> bool {
        self.get_version() == DS_LOG_VERSION
    }

    pub fn get_timestamp(&self) -> Result<f64> {
        read_header_timestamp(self.data).map_err(Error::parse)
    }

    /// Decodes every event, with formatting tags stripped from the text.
    pub fn entries(&self) -> Result<Vec<DsEvent>> {
        if !self.is_supported_version() {
            return Err(unsupported("DS events", self.get_version()));
        }
        self.read_entries().map_err(Error::parse)
    }

    fn read_entries(&self) -> anyhow::Result<Vec<DsEvent>> {
        let start_time = read_header_timestamp(self.data)?;
        let mut cursor = Cursor::new(self.data);
        cursor.set_position(HEADER_LEN);

        let mut events = Vec::new();
        while cursor.position() < self.data.len() as u64 {
            let seconds = cursor.read_i64::<BigEndian>()?;
            let fractional = cursor.read_u64::<BigEndian>()?;
            let length = cursor.read_i32::<BigEndian>()?;
            if length < 0 {
                bail!("Negative event length {} in event {}", length, events.len());
            }
            let mut text = vec![0; length as usize];
            cursor
                .read_exact(&mut text)
                .with_context(|| format!("Truncated text in event {}", events.len()))?;

            events.push(DsEvent {
                timestamp: convert_lv_time(seconds, fractional) - start_time,
                text: clean_event_text(&String::from_utf8_lossy(&text)),
            });
        }
        Ok(events)
    }
}

/// Removes the inline formatting tags from an event message.
///
/// Metadata tags are dropped along with their content up to the next tag.
pub fn clean_event_text(text: &str) -> String {
    let mut text = text.to_string();
    for tag in STRIPPED_EVENT_TAGS {
        while let Some(tag_index) = text.find(tag) {
            match text[tag_index + 1..].find('<') {
                Some(next) => text.replace_range(tag_index..tag_index + 1 + next, ""),
                None => text.truncate(tag_index),
            }
        }
    }
    text.replace("<message> ", "")
        .replace("<details> ", "")
        .trim()
        .to_string()
}

/// Decodes a status log and/or an event log into one store.
///
/// Either input may be absent. A version mismatch in either aborts the
/// whole decode.
pub fn decode_ds_logs(ds_log: Option<&[u8]>, ds_events: Option<&[u8]>) -> Result<LogStore> {
    let mut log = LogStore::new();

    if let Some(data) = ds_log {
        for entry in DsLogReader::new(data).entries()? {
            let t = entry.timestamp;
            log.put_number("/DSLog/TripTimeMS", t, entry.trip_time_ms);
            log.put_number("/DSLog/PacketLoss", t, entry.packet_loss);
            log.put_number("/DSLog/BatteryVoltage", t, entry.battery_volts);
            log.put_number("/DSLog/RioCPUUtilization", t, entry.rio_cpu_utilization);
            log.put_boolean("/DSLog/Status/Brownout", t, entry.brownout);
            log.put_boolean("/DSLog/Status/Watchdog", t, entry.watchdog);
            log.put_boolean("/DSLog/Status/DSTeleop", t, entry.ds_teleop);
            log.put_boolean("/DSLog/Status/DSDisabled", t, entry.ds_disabled);
            log.put_boolean("/DSLog/Status/RobotTeleop", t, entry.robot_teleop);
            log.put_boolean("/DSLog/Status/RobotAuto", t, entry.robot_auto);
            log.put_boolean("/DSLog/Status/RobotDisabled", t, entry.robot_disabled);
            log.put_number("/DSLog/CANUtilization", t, entry.can_utilization);
            log.put_number("/DSLog/WifiDb", t, entry.wifi_db);
            log.put_number("/DSLog/WifiMb", t, entry.wifi_mb);
            log.put_number_array(
                "/DSLog/PowerDistributionCurrents",
                t,
                entry.power_distribution_currents,
            );
        }
    }

    if let Some(data) = ds_events {
        for event in DsEventsReader::new(data).entries()? {
            log.put_string("/DSEvents", event.timestamp, event.text);
        }
    }

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_lv_time() {
        assert_eq!(convert_lv_time(2_082_826_800, 0), 0.0);
        assert_eq!(convert_lv_time(2_082_826_810, 1 << 63), 10.5);
    }

    #[test]
    fn test_power_distribution_type() {
        assert_eq!(PowerDistributionType::from_id(33), PowerDistributionType::Rev);
        assert_eq!(PowerDistributionType::from_id(25), PowerDistributionType::Ctre);
        assert_eq!(PowerDistributionType::from_id(0), PowerDistributionType::None);
    }

    #[test]
    fn test_clean_event_text() {
        let raw = "<TagVersion>1 <time> 00:01.234 <message> Robot code ready <flags> 0 ";
        assert_eq!(clean_event_text(raw), "Robot code ready");
    }

    #[test]
    fn test_clean_event_text_trailing_tag() {
        assert_eq!(
            clean_event_text("<details> Joystick unplugged <location> Driver Station"),
            "Joystick unplugged"
        );
    }

    #[test]
    fn test_rev_ten_bit_channels() {
        // channel 0 = 8 (1.0 A), channel 1 = 16 (2.0 A), channel 2 = 1023
        let word0: u32 = 8 | (16 << 10) | (1023 << 20);
        let mut data = word0.to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 20]);
        data.extend_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&[16, 32, 0, 160]);
        data.push(0);

        let mut cursor = Cursor::new(&data[..]);
        let currents = read_rev_currents(&mut cursor).unwrap();
        assert_eq!(currents.len(), 24);
        assert_eq!(&currents[0..3], &[1.0, 2.0, 127.875]);
        assert_eq!(&currents[20..24], &[1.0, 2.0, 0.0, 10.0]);
        assert_eq!(cursor.position(), 32);
    }

    #[test]
    fn test_ctre_bitmap_channels() {
        let mut data = [0u8; 24];
        // channel 0 at bits 0..8, channel 1 at bits 10..18
        data[0] = 32;
        data[1] = 0b0000_0100;
        let mut cursor = Cursor::new(&data[..]);
        let currents = read_ctre_currents(&mut cursor).unwrap();
        assert_eq!(currents.len(), 16);
        assert_eq!(currents[0], 2.0);
        assert_eq!(currents[1], 1.0 / 16.0);
        assert_eq!(cursor.position(), 24);
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = vec![0, 0, 0, 3];
        data.extend_from_slice(&[0; 16]);
        let result = DsLogReader::new(&data).entries();
        assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
        let result = decode_ds_logs(None, Some(&data));
        assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_header_only_log_is_empty() {
        let mut data = vec![0, 0, 0, 4];
        data.extend_from_slice(&[0; 16]);
        assert!(DsLogReader::new(&data).entries().unwrap().is_empty());
    }
}
