//! Decoder for the append-only RLOG streaming telemetry protocol.
//!
//! A session starts with a revision byte. Each cycle is a big-endian `f64`
//! timestamp followed by tagged chunks: `0` ends the cycle, `1` interns a key
//! name under a 16-bit id, `2` carries a value for an interned key.
//!
//! Timestamps that do not advance by a plausible step are treated as
//! corruption: the decoder slides forward one byte at a time until it finds a
//! plausible timestamp again.

use anyhow::{bail, Context};
use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::log::LogStore;
use crate::models::LogValue;

pub const SUPPORTED_LOG_REVISIONS: [u8; 1] = [1];
pub const MIN_TIMESTAMP_STEP: f64 = 0.0001;
pub const MAX_TIMESTAMP_STEP: f64 = 15.0;

const CHUNK_END: u8 = 0;
const CHUNK_KEY: u8 = 1;
const CHUNK_VALUE: u8 = 2;

/// Decoded value chunk payload.
#[derive(Debug, Clone, PartialEq)]
enum Payload {
    /// Reset the field to its kind's zero value
    Clear,
    Value(LogValue),
    Unknown(u8),
}

fn read_length(cursor: &mut Cursor<&[u8]>) -> anyhow::Result<usize> {
    let length = cursor.read_i16::<BigEndian>()?;
    if length < 0 {
        bail!("Negative length {} at byte {}", length, cursor.position() - 2);
    }
    Ok(length as usize)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> anyhow::Result<String> {
    let length = read_length(cursor)?;
    let mut bytes = vec![0; length];
    cursor
        .read_exact(&mut bytes)
        .with_context(|| format!("String of {} bytes runs past end of data", length))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_payload(cursor: &mut Cursor<&[u8]>, value_type: u8) -> anyhow::Result<Payload> {
    let value = match value_type {
        0 => return Ok(Payload::Clear),
        1 => LogValue::Boolean(cursor.read_u8()? != 0),
        2 => {
            let length = read_length(cursor)?;
            let items = (0..length)
                .map(|_| cursor.read_u8().map(|b| b != 0))
                .collect::<std::io::Result<Vec<_>>>()?;
            LogValue::BooleanArray(items)
        }
        3 => LogValue::Number(cursor.read_i32::<BigEndian>()? as f64),
        4 => {
            let length = read_length(cursor)?;
            let items = (0..length)
                .map(|_| cursor.read_i32::<BigEndian>().map(f64::from))
                .collect::<std::io::Result<Vec<_>>>()?;
            LogValue::NumberArray(items)
        }
        5 => LogValue::Number(cursor.read_f64::<BigEndian>()?),
        6 => {
            let length = read_length(cursor)?;
            let items = (0..length)
                .map(|_| cursor.read_f64::<BigEndian>())
                .collect::<std::io::Result<Vec<_>>>()?;
            LogValue::NumberArray(items)
        }
        7 => LogValue::String(read_string(cursor)?),
        8 => {
            let length = read_length(cursor)?;
            let items = (0..length)
                .map(|_| read_string(cursor))
                .collect::<anyhow::Result<Vec<_>>>()?;
            LogValue::StringArray(items)
        }
        9 => LogValue::Raw(vec![cursor.read_u8()?]),
        10 => {
            let length = read_length(cursor)?;
            let mut bytes = vec![0; length];
            cursor.read_exact(&mut bytes)?;
            LogValue::Raw(bytes)
        }
        other => return Ok(Payload::Unknown(other)),
    };
    Ok(Payload::Value(value))
}

/// Stateful RLOG decoder for one session.
///
/// The revision, the interned key table and the last accepted timestamp carry
/// over between calls to [`decode`](Self::decode), so a live stream can be fed
/// frame by frame. Use a fresh decoder for every unrelated stream.
#[derive(Debug, Default)]
pub struct RlogDecoder {
    log_revision: Option<u8>,
    last_timestamp: Option<f64>,
    last_timestamp_corrupted: Option<f64>,
    key_ids: HashMap<i16, String>,
}

impl RlogDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_revision(&self) -> Option<u8> {
        self.log_revision
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Decode one buffer into `log`.
    ///
    /// The first buffer of a session starts with the revision byte. On error
    /// the contents of `log` are unspecified and should be discarded.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedVersion`] for an unknown revision,
    /// [`Error::ParseError`] for malformed or truncated data.
    pub fn decode(&mut self, log: &mut LogStore, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);

        if self.log_revision.is_none() {
            let revision = cursor
                .read_u8()
                .map_err(|_| Error::ParseError("Empty RLOG buffer".to_string()))?;
            if !SUPPORTED_LOG_REVISIONS.contains(&revision) {
                return Err(Error::UnsupportedVersion(format!("RLOG revision {}", revision)));
            }
            self.log_revision = Some(revision);
        }
        cursor.set_position(cursor.position() + 1);

        self.read_cycles(log, &mut cursor).map_err(Error::parse)
    }

    fn read_cycles(&mut self, log: &mut LogStore, cursor: &mut Cursor<&[u8]>) -> anyhow::Result<()> {
        let length = cursor.get_ref().len() as u64;

        while cursor.position() < length {
            let timestamp = cursor
                .read_f64::<BigEndian>()
                .with_context(|| format!("Truncated timestamp at byte {}", cursor.position()))?;

            if let Some(last) = self.last_timestamp {
                if timestamp.is_nan()
                    || timestamp < last + MIN_TIMESTAMP_STEP
                    || timestamp > last + MAX_TIMESTAMP_STEP
                {
                    if self.last_timestamp_corrupted != Some(last) {
                        warn!(
                            "Corrupted log data skipped near {:.2} seconds (byte {})",
                            last,
                            cursor.position() - 8
                        );
                    }
                    self.last_timestamp_corrupted = Some(last);
                    cursor.set_position(cursor.position() - 7);
                    continue;
                }
            }

            self.last_timestamp = Some(timestamp);
            self.read_chunks(log, cursor, timestamp)?;
        }

        Ok(())
    }

    fn read_chunks(
        &mut self,
        log: &mut LogStore,
        cursor: &mut Cursor<&[u8]>,
        timestamp: f64,
    ) -> anyhow::Result<()> {
        // Running out of data also ends the cycle
        while let Ok(chunk_type) = cursor.read_u8() {
            match chunk_type {
                CHUNK_END => break,
                CHUNK_KEY => {
                    let key_id = cursor.read_i16::<BigEndian>()?;
                    let name = read_string(cursor)?;
                    self.key_ids.insert(key_id, name);
                }
                CHUNK_VALUE => {
                    let key_id = cursor.read_i16::<BigEndian>()?;
                    let value_type = cursor.read_u8()?;
                    let payload = read_payload(cursor, value_type)?;

                    let Some(key) = self.key_ids.get(&key_id) else {
                        debug!("Dropping value for unregistered key id {}", key_id);
                        continue;
                    };
                    match payload {
                        Payload::Clear => {
                            if let Some(kind) = log.get_type(key) {
                                log.put(key, timestamp, LogValue::zero(kind));
                            }
                        }
                        Payload::Value(value) => log.put(key, timestamp, value),
                        Payload::Unknown(value_type) => {
                            debug!("Skipping unknown value type {} for {}", value_type, key);
                        }
                    }
                }
                other => debug!("Skipping unknown chunk type {}", other),
            }
        }
        Ok(())
    }
}

/// Decode a complete RLOG buffer with a fresh decoder.
pub fn decode_rlog(data: &[u8]) -> Result<LogStore> {
    let mut log = LogStore::new();
    RlogDecoder::new().decode(&mut log, data)?;
    Ok(log)
}

/// Reassembles frames from a live RLOG byte stream.
///
/// Each frame is prefixed by its length as a big-endian `i32`; the prefix is
/// stripped from the returned frame.
#[derive(Debug, Default)]
pub struct RlogFrameBuffer {
    buffer: Vec<u8>,
}

impl RlogFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes received but not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the next complete frame, if one has fully arrived.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.len() < 4 {
            return Ok(None);
        }
        let length = Cursor::new(&self.buffer[..4]).read_i32::<BigEndian>()?;
        if length < 0 {
            return Err(Error::ParseError(format!("Negative frame length {}", length)));
        }
        let expected = length as usize + 4;
        if self.buffer.len() < expected {
            return Ok(None);
        }
        let frame = self.buffer[4..expected].to_vec();
        self.buffer.drain(..expected);
        Ok(Some(frame))
    }
}
