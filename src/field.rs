//! Step-function history of a single field.

use crate::models::{LogRange, LogValue, LoggableType, SerializedField};

/// Ordered `(timestamp, value)` history for one field.
///
/// Only value changes are kept: each entry marks the start of a run of equal
/// values, anchored at the earliest timestamp observed for that run.
#[derive(Debug, Clone, PartialEq)]
pub struct LogField {
    kind: LoggableType,
    timestamps: Vec<f64>,
    values: Vec<LogValue>,
}

impl LogField {
    pub fn new(kind: LoggableType) -> Self {
        Self {
            kind,
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn kind(&self) -> LoggableType {
        self.kind
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[LogValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Returns the samples needed to draw `[start, end]` as a step function.
    ///
    /// The first returned sample is the one holding at `start` (or the first
    /// sample if `start` precedes the history). The last is the first sample
    /// at or after `end`, or the end of the history.
    pub fn get_range(&self, start: f64, end: f64) -> LogRange {
        if self.timestamps.is_empty() {
            return LogRange::default();
        }

        let start_index = match self.timestamps.iter().position(|&t| t > start) {
            None => self.timestamps.len() - 1,
            Some(0) => 0,
            Some(index) => index - 1,
        };
        let end_index = match self.timestamps.partition_point(|&t| t < end) {
            index if index + 1 >= self.timestamps.len() => self.timestamps.len(),
            index => index + 1,
        }
        .max(start_index + 1);

        LogRange {
            timestamps: self.timestamps[start_index..end_index].to_vec(),
            values: self.values[start_index..end_index].to_vec(),
        }
    }

    /// Value of the latest entry at or before `timestamp`.
    pub fn value_at(&self, timestamp: f64) -> Option<&LogValue> {
        let index = self.timestamps.partition_point(|&t| t <= timestamp);
        if index == 0 {
            None
        } else {
            self.values.get(index - 1)
        }
    }

    /// Writes a value if it matches this field's kind. Returns whether the
    /// write was accepted; mismatched kinds are dropped silently.
    pub fn put(&mut self, timestamp: f64, value: LogValue) -> bool {
        if value.loggable_type() != self.kind {
            return false;
        }
        self.put_data(timestamp, value);
        true
    }

    fn put_data(&mut self, timestamp: f64, value: LogValue) {
        let insert_index = self.timestamps.partition_point(|&t| t < timestamp);

        if self.timestamps.get(insert_index) == Some(&timestamp) {
            self.values[insert_index] = value;
            return;
        }

        if insert_index > 0 && self.values[insert_index - 1] == value {
            return;
        }

        if insert_index < self.values.len() && self.values[insert_index] == value {
            self.timestamps[insert_index] = timestamp;
        } else {
            self.timestamps.insert(insert_index, timestamp);
            self.values.insert(insert_index, value);
        }
    }

    pub(crate) fn shift_timestamps(&mut self, offset: f64) {
        for timestamp in &mut self.timestamps {
            *timestamp += offset;
        }
    }

    pub fn to_serialized(&self) -> SerializedField {
        SerializedField {
            kind: self.kind,
            timestamps: self.timestamps.clone(),
            values: self.values.clone(),
        }
    }

    pub fn from_serialized(serialized: SerializedField) -> Self {
        Self {
            kind: serialized.kind,
            timestamps: serialized.timestamps,
            values: serialized.values,
        }
    }
}
