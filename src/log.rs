//! The field registry shared by every decoder and export generator.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::field::LogField;
use crate::models::{FieldTreeNode, LogRange, LogValue, LoggableType, SerializedLog};

const DEFAULT_TIMESTAMP_RANGE: (f64, f64) = (0.0, 10.0);

#[derive(Debug, Clone, Default)]
struct TimestampSetCache {
    keys: Vec<String>,
    timestamps: Vec<f64>,
}

/// An in-memory, time-indexed log: one [`LogField`] per key.
///
/// Keys are hierarchical paths separated by `/` or `:`. Array-valued fields
/// are expanded into scalar children named `<key>/<index>`, created the first
/// time an array write reaches that index and never removed afterwards.
///
/// # Examples
///
/// ```
/// use robolog::LogStore;
///
/// let mut log = LogStore::new();
/// log.put_number("/Drive/LeftVelocity", 0.02, 1.5);
/// log.put_number_array("/Drive/ModuleStates", 0.02, vec![0.1, 0.2]);
///
/// assert_eq!(log.get_field_count(), 2);
/// assert!(log.is_array_item_field("/Drive/ModuleStates/1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogStore {
    fields: BTreeMap<String, LogField>,
    array_lengths: BTreeMap<String, usize>,
    array_item_fields: BTreeSet<String>,
    timestamp_range: Option<(f64, f64)>,
    timestamp_set_cache: HashMap<String, TimestampSetCache>,
}

impl PartialEq for LogStore {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
            && self.array_lengths == other.array_lengths
            && self.array_item_fields == other.array_item_fields
            && self.timestamp_range == other.timestamp_range
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a field with a fixed kind. Does nothing if the key exists.
    pub fn create_field(&mut self, key: &str, kind: LoggableType) {
        if self.fields.contains_key(key) {
            return;
        }
        self.fields.insert(key.to_string(), LogField::new(kind));
        if kind.is_array() {
            self.array_lengths.insert(key.to_string(), 0);
        }
    }

    fn update_timestamp_range(&mut self, timestamp: f64) {
        self.timestamp_range = Some(match self.timestamp_range {
            None => (timestamp, timestamp),
            Some((min, max)) => (min.min(timestamp), max.max(timestamp)),
        });
    }

    fn process_timestamp(&mut self, key: &str, timestamp: f64) {
        self.update_timestamp_range(timestamp);
        for cache in self.timestamp_set_cache.values_mut() {
            if !cache.keys.iter().any(|k| k == key) {
                continue;
            }
            let insert_index = cache.timestamps.partition_point(|&t| t < timestamp);
            if cache.timestamps.get(insert_index) != Some(&timestamp) {
                cache.timestamps.insert(insert_index, timestamp);
            }
        }
    }

    pub fn get_field_keys(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Number of fields, not counting synthetic array items.
    pub fn get_field_count(&self) -> usize {
        self.fields
            .keys()
            .filter(|key| !self.array_item_fields.contains(*key))
            .count()
    }

    pub fn get_field(&self, key: &str) -> Option<&LogField> {
        self.fields.get(key)
    }

    pub fn get_type(&self, key: &str) -> Option<LoggableType> {
        self.fields.get(key).map(LogField::kind)
    }

    pub fn is_array_item_field(&self, key: &str) -> bool {
        self.array_item_fields.contains(key)
    }

    /// Longest array ever written to an array field.
    pub fn get_array_length(&self, key: &str) -> Option<usize> {
        self.array_lengths.get(key).copied()
    }

    /// Sorted, deduplicated union of the timestamps of every existing key.
    pub fn get_timestamps<S: AsRef<str>>(&self, keys: &[S]) -> Vec<f64> {
        let fields: Vec<&LogField> = keys
            .iter()
            .filter_map(|key| self.fields.get(key.as_ref()))
            .collect();

        match fields.as_slice() {
            [] => Vec::new(),
            [field] => field.timestamps().to_vec(),
            _ => {
                let mut output: Vec<f64> = fields
                    .iter()
                    .flat_map(|field| field.timestamps().iter().copied())
                    .collect();
                output.sort_by(|a, b| a.total_cmp(b));
                output.dedup();
                output
            }
        }
    }

    /// Like [`get_timestamps`](Self::get_timestamps), memoized under `cache_id`.
    ///
    /// The cached union is reused while the key set is unchanged and is kept
    /// up to date as writes to any of its keys arrive.
    pub fn get_timestamps_cached<S: AsRef<str>>(&mut self, keys: &[S], cache_id: &str) -> Vec<f64> {
        let keys: Vec<String> = keys
            .iter()
            .map(|key| key.as_ref())
            .filter(|key| self.fields.contains_key(*key))
            .map(str::to_string)
            .collect();

        if keys.len() <= 1 {
            return self.get_timestamps(&keys);
        }

        if let Some(cache) = self.timestamp_set_cache.get(cache_id) {
            if cache.keys == keys {
                return cache.timestamps.clone();
            }
        }

        let timestamps = self.get_timestamps(&keys);
        self.timestamp_set_cache.insert(
            cache_id.to_string(),
            TimestampSetCache {
                keys,
                timestamps: timestamps.clone(),
            },
        );
        timestamps
    }

    /// Global `[min, max]` over every write, `[0, 10]` when nothing was written.
    pub fn get_timestamp_range(&self) -> (f64, f64) {
        self.timestamp_range.unwrap_or(DEFAULT_TIMESTAMP_RANGE)
    }

    pub fn get_last_timestamp(&self) -> Option<f64> {
        self.get_timestamps(&self.get_field_keys()).last().copied()
    }

    /// Builds a prefix tree over the `/` and `:` separated key segments.
    ///
    /// Only keys starting with `prefix` are included and the prefix is removed
    /// before splitting. Nodes that correspond to a registered field carry its
    /// full key.
    pub fn get_field_tree(
        &self,
        include_array_items: bool,
        prefix: &str,
    ) -> BTreeMap<String, FieldTreeNode> {
        let mut root = FieldTreeNode::default();

        for key in self.fields.keys() {
            if !include_array_items && self.array_item_fields.contains(key) {
                continue;
            }
            let Some(relative) = key.strip_prefix(prefix) else {
                continue;
            };

            let mut position = &mut root;
            let relative = relative.strip_prefix('/').unwrap_or(relative);
            for segment in relative.split(['/', ':']) {
                if segment.is_empty() {
                    continue;
                }
                position = position.children.entry(segment.to_string()).or_default();
            }
            position.full_key = Some(key.clone());
        }

        root.children
    }

    pub fn get_range(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.fields.get(key).map(|field| field.get_range(start, end))
    }

    fn get_range_of(&self, key: &str, kind: LoggableType, start: f64, end: f64) -> Option<LogRange> {
        self.fields
            .get(key)
            .filter(|field| field.kind() == kind)
            .map(|field| field.get_range(start, end))
    }

    pub fn get_raw(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.get_range_of(key, LoggableType::Raw, start, end)
    }

    pub fn get_boolean(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.get_range_of(key, LoggableType::Boolean, start, end)
    }

    pub fn get_number(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.get_range_of(key, LoggableType::Number, start, end)
    }

    pub fn get_string(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.get_range_of(key, LoggableType::String, start, end)
    }

    pub fn get_boolean_array(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.get_range_of(key, LoggableType::BooleanArray, start, end)
    }

    pub fn get_number_array(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.get_range_of(key, LoggableType::NumberArray, start, end)
    }

    pub fn get_string_array(&self, key: &str, start: f64, end: f64) -> Option<LogRange> {
        self.get_range_of(key, LoggableType::StringArray, start, end)
    }

    /// Writes a value, creating the field with the value's kind if needed.
    ///
    /// Writes whose kind differs from the field's are dropped. Scalar writes
    /// to a synthetic array item are dropped as well; those fields are only
    /// fed by writes to their parent array.
    pub fn put(&mut self, key: &str, timestamp: f64, value: LogValue) {
        if value.loggable_type().is_array() {
            self.put_array(key, timestamp, value);
        } else {
            self.put_scalar(key, timestamp, value);
        }
    }

    pub fn put_raw(&mut self, key: &str, timestamp: f64, value: Vec<u8>) {
        self.put(key, timestamp, LogValue::Raw(value));
    }

    pub fn put_boolean(&mut self, key: &str, timestamp: f64, value: bool) {
        self.put(key, timestamp, LogValue::Boolean(value));
    }

    pub fn put_number(&mut self, key: &str, timestamp: f64, value: f64) {
        self.put(key, timestamp, LogValue::Number(value));
    }

    pub fn put_string(&mut self, key: &str, timestamp: f64, value: impl Into<String>) {
        self.put(key, timestamp, LogValue::String(value.into()));
    }

    pub fn put_boolean_array(&mut self, key: &str, timestamp: f64, value: Vec<bool>) {
        self.put(key, timestamp, LogValue::BooleanArray(value));
    }

    pub fn put_number_array(&mut self, key: &str, timestamp: f64, value: Vec<f64>) {
        self.put(key, timestamp, LogValue::NumberArray(value));
    }

    pub fn put_string_array(&mut self, key: &str, timestamp: f64, value: Vec<String>) {
        self.put(key, timestamp, LogValue::StringArray(value));
    }

    fn put_scalar(&mut self, key: &str, timestamp: f64, value: LogValue) {
        if self.array_item_fields.contains(key) {
            return;
        }
        self.create_field(key, value.loggable_type());

        let accepted = match self.fields.get_mut(key) {
            Some(field) => field.put(timestamp, value),
            None => false,
        };
        if accepted {
            self.process_timestamp(key, timestamp);
        }
    }

    fn put_array(&mut self, key: &str, timestamp: f64, value: LogValue) {
        let kind = value.loggable_type();
        self.create_field(key, kind);
        if self.get_type(key) != Some(kind) {
            return;
        }
        let (Some(item_kind), Some(items)) = (kind.element_type(), value.array_items()) else {
            return;
        };

        self.process_timestamp(key, timestamp);
        if let Some(field) = self.fields.get_mut(key) {
            field.put(timestamp, value);
        }

        let known_length = self.array_lengths.get(key).copied().unwrap_or(0);
        if items.len() > known_length {
            for index in known_length..items.len() {
                let item_key = format!("{}/{}", key, index);
                self.fields.insert(item_key.clone(), LogField::new(item_kind));
                self.array_item_fields.insert(item_key);
            }
            self.array_lengths.insert(key.to_string(), items.len());
        }

        for (index, item) in items.into_iter().enumerate() {
            let item_key = format!("{}/{}", key, index);
            self.process_timestamp(&item_key, timestamp);
            if let Some(field) = self.fields.get_mut(&item_key) {
                field.put(timestamp, item);
            }
        }
    }

    pub fn to_serialized(&self) -> SerializedLog {
        SerializedLog {
            fields: self
                .fields
                .iter()
                .map(|(key, field)| (key.clone(), field.to_serialized()))
                .collect(),
            array_lengths: self.array_lengths.clone(),
            array_item_fields: self.array_item_fields.clone(),
            timestamp_range: self.timestamp_range.map(|(min, max)| [min, max]),
        }
    }

    pub fn from_serialized(serialized: SerializedLog) -> Self {
        Self {
            fields: serialized
                .fields
                .into_iter()
                .map(|(key, field)| (key, LogField::from_serialized(field)))
                .collect(),
            array_lengths: serialized.array_lengths,
            array_item_fields: serialized.array_item_fields,
            timestamp_range: serialized.timestamp_range.map(|[min, max]| (min, max)),
            timestamp_set_cache: HashMap::new(),
        }
    }

    /// Combines two logs into a new one after shifting every timestamp of
    /// `second` by `timestamp_offset`.
    ///
    /// Fields present in both logs are taken from `second`.
    pub fn merge(first: &LogStore, second: &LogStore, timestamp_offset: f64) -> LogStore {
        let mut log = LogStore {
            fields: first.fields.clone(),
            array_lengths: first.array_lengths.clone(),
            array_item_fields: first.array_item_fields.clone(),
            timestamp_range: first.timestamp_range,
            timestamp_set_cache: HashMap::new(),
        };

        for (key, field) in &second.fields {
            let mut field = field.clone();
            field.shift_timestamps(timestamp_offset);
            log.fields.insert(key.clone(), field);
        }
        log.array_lengths
            .extend(second.array_lengths.iter().map(|(k, v)| (k.clone(), *v)));
        log.array_item_fields
            .extend(second.array_item_fields.iter().cloned());

        let second_range = second
            .timestamp_range
            .map(|(min, max)| (min + timestamp_offset, max + timestamp_offset));
        log.timestamp_range = match (log.timestamp_range, second_range) {
            (Some((a_min, a_max)), Some((b_min, b_max))) => Some((a_min.min(b_min), a_max.max(b_max))),
            (range, None) | (None, range) => range,
        };

        log
    }
}
