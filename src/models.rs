use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The kind of value a field holds. A field keeps the kind of its first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoggableType {
    Raw,
    Boolean,
    Number,
    String,
    BooleanArray,
    NumberArray,
    StringArray,
}

impl LoggableType {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            LoggableType::BooleanArray | LoggableType::NumberArray | LoggableType::StringArray
        )
    }

    /// Element kind of an array kind, used for the synthetic `<key>/<index>` fields.
    pub fn element_type(&self) -> Option<LoggableType> {
        match self {
            LoggableType::BooleanArray => Some(LoggableType::Boolean),
            LoggableType::NumberArray => Some(LoggableType::Number),
            LoggableType::StringArray => Some(LoggableType::String),
            LoggableType::Raw
            | LoggableType::Boolean
            | LoggableType::Number
            | LoggableType::String => None,
        }
    }

    /// Type tag used when writing this kind into a WPILOG container.
    pub fn wpilog_type(&self) -> &'static str {
        match self {
            LoggableType::Raw => "raw",
            LoggableType::Boolean => "boolean",
            LoggableType::Number => "double",
            LoggableType::String => "string",
            LoggableType::BooleanArray => "boolean[]",
            LoggableType::NumberArray => "double[]",
            LoggableType::StringArray => "string[]",
        }
    }
}

/// A single logged value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogValue {
    Raw(Vec<u8>),
    Boolean(bool),
    Number(f64),
    String(String),
    BooleanArray(Vec<bool>),
    NumberArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl LogValue {
    pub fn loggable_type(&self) -> LoggableType {
        match self {
            LogValue::Raw(_) => LoggableType::Raw,
            LogValue::Boolean(_) => LoggableType::Boolean,
            LogValue::Number(_) => LoggableType::Number,
            LogValue::String(_) => LoggableType::String,
            LogValue::BooleanArray(_) => LoggableType::BooleanArray,
            LogValue::NumberArray(_) => LoggableType::NumberArray,
            LogValue::StringArray(_) => LoggableType::StringArray,
        }
    }

    /// The "cleared" value of a kind: empty bytes, false, 0, "" or an empty array.
    pub fn zero(kind: LoggableType) -> LogValue {
        match kind {
            LoggableType::Raw => LogValue::Raw(Vec::new()),
            LoggableType::Boolean => LogValue::Boolean(false),
            LoggableType::Number => LogValue::Number(0.0),
            LoggableType::String => LogValue::String(String::new()),
            LoggableType::BooleanArray => LogValue::BooleanArray(Vec::new()),
            LoggableType::NumberArray => LogValue::NumberArray(Vec::new()),
            LoggableType::StringArray => LogValue::StringArray(Vec::new()),
        }
    }

    /// Splits an array value into scalar values. Returns `None` for scalars.
    pub fn array_items(&self) -> Option<Vec<LogValue>> {
        match self {
            LogValue::BooleanArray(items) => {
                Some(items.iter().map(|&b| LogValue::Boolean(b)).collect())
            }
            LogValue::NumberArray(items) => {
                Some(items.iter().map(|&n| LogValue::Number(n)).collect())
            }
            LogValue::StringArray(items) => {
                Some(items.iter().map(|s| LogValue::String(s.clone())).collect())
            }
            LogValue::Raw(_) | LogValue::Boolean(_) | LogValue::Number(_) | LogValue::String(_) => {
                None
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            LogValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            LogValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LogValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<bool> for LogValue {
    fn from(value: bool) -> Self {
        LogValue::Boolean(value)
    }
}

impl From<f64> for LogValue {
    fn from(value: f64) -> Self {
        LogValue::Number(value)
    }
}

impl From<&str> for LogValue {
    fn from(value: &str) -> Self {
        LogValue::String(value.to_string())
    }
}

impl From<String> for LogValue {
    fn from(value: String) -> Self {
        LogValue::String(value)
    }
}

/// A slice of a field's history: parallel timestamp and value arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogRange {
    pub timestamps: Vec<f64>,
    pub values: Vec<LogValue>,
}

impl LogRange {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// One node of the hierarchical key namespace built by `LogStore::get_field_tree`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTreeNode {
    /// Set when a registered field ends at this node.
    pub full_key: Option<String>,
    pub children: BTreeMap<String, FieldTreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedField {
    #[serde(rename = "type")]
    pub kind: LoggableType,
    pub timestamps: Vec<f64>,
    pub values: Vec<LogValue>,
}

/// Transport-neutral form of a whole `LogStore`, exchanged between decode units
/// and their callers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedLog {
    pub fields: BTreeMap<String, SerializedField>,
    pub array_lengths: BTreeMap<String, usize>,
    pub array_item_fields: BTreeSet<String>,
    pub timestamp_range: Option<[f64; 2]>,
}
