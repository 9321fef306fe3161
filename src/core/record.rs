//! Structured log records supplied by the producer
//!
//! This module provides:
//! - `Record`: an ordered list of named fields, each with a loggable flag
//! - `FieldValue`: scalar, vector, and nested record values
//! - `StreamId`: the key identifying the logging stream a record belongs to

use super::error::{Result, ShipperError};
use serde_json::{Map, Value};
use std::fmt;

/// Value type for record fields
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Count(u64),
    Double(f64),
    String(String),
    /// Rendered as a JSON array, never flattened
    Vector(Vec<FieldValue>),
    /// Flattened into dotted keys when rendered
    Record(Record),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Count(c) => write!(f, "{}", c),
            FieldValue::Double(d) => write!(f, "{}", d),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Vector(_) | FieldValue::Record(_) => write!(f, "{}", self.to_json_value()),
        }
    }
}

impl FieldValue {
    /// Convert to serde_json::Value for JSON serialization
    ///
    /// Nested records inside vectors render as objects of their loggable
    /// fields; only top-level record fields are flattened.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::Number((*i).into()),
            FieldValue::Count(c) => Value::Number((*c).into()),
            FieldValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Vector(items) => {
                Value::Array(items.iter().map(FieldValue::to_json_value).collect())
            }
            FieldValue::Record(record) => {
                let mut object = Map::new();
                for field in record.fields().iter().filter(|f| f.log) {
                    object.insert(field.name.clone(), field.value.to_json_value());
                }
                Value::Object(object)
            }
        }
    }

    /// Build a value from decoded JSON, marking nested object fields loggable
    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(c) = n.as_u64() {
                    FieldValue::Count(c)
                } else {
                    FieldValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(items) => FieldValue::Vector(items.iter().map(FieldValue::from_json).collect()),
            Value::Object(object) => FieldValue::Record(Record::from_json_object(object)),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(c: u64) -> Self {
        FieldValue::Count(c)
    }
}

impl From<f64> for FieldValue {
    fn from(d: f64) -> Self {
        FieldValue::Double(d)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<Record> for FieldValue {
    fn from(r: Record) -> Self {
        FieldValue::Record(r)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::Vector(items.into_iter().map(Into::into).collect())
    }
}

/// One named field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    /// Whether the producer's schema marks this field for logging
    pub log: bool,
}

/// A structured log record
///
/// Field order is the schema order and is preserved through rendering.
///
/// # Example
///
/// ```
/// use udp_log_shipper::Record;
///
/// let record = Record::new()
///     .with_field("ts", 1.0)
///     .with_field("note", "X")
///     .with_unlogged_field("internal", true);
///
/// assert_eq!(record.to_json().unwrap(), r#"{"ts":1.0,"note":"X"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    /// Create a new empty record
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a loggable field
    pub fn with_field<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.add_field(name, value, true);
        self
    }

    /// Add a field the schema does not mark for logging
    pub fn with_unlogged_field<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.add_field(name, value, false);
        self
    }

    /// Add a field (mutable version)
    pub fn add_field<K, V>(&mut self, name: K, value: V, log: bool)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            log,
        });
    }

    /// Get all fields in schema order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a decoded JSON value
    ///
    /// Every field is loggable; nested objects become nested records.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(Self::from_json_object(object)),
            other => Err(ShipperError::invalid_record(format!(
                "expected a JSON object, got {}",
                json_kind(other)
            ))),
        }
    }

    fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut record = Self::new();
        for (name, value) in object {
            record.add_field(name.clone(), FieldValue::from_json(value), true);
        }
        record
    }

    /// Keep only loggable fields, recursing into nested records
    #[must_use]
    pub fn select_loggable(&self) -> Record {
        let fields = self
            .fields
            .iter()
            .filter(|field| field.log)
            .map(|field| Field {
                name: field.name.clone(),
                value: match &field.value {
                    FieldValue::Record(inner) => FieldValue::Record(inner.select_loggable()),
                    other => other.clone(),
                },
                log: true,
            })
            .collect();
        Record { fields }
    }

    /// Flatten nested records into a single level of dotted keys
    ///
    /// Keys keep schema order. Colliding keys are not deduplicated: the last
    /// value written wins and the key keeps its first position.
    #[must_use]
    pub fn flatten(&self) -> Map<String, Value> {
        let mut out = Map::new();
        self.flatten_into(None, &mut out);
        out
    }

    fn flatten_into(&self, prefix: Option<&str>, out: &mut Map<String, Value>) {
        for field in &self.fields {
            let key = match prefix {
                Some(prefix) => format!("{}.{}", prefix, field.name),
                None => field.name.clone(),
            };
            match &field.value {
                FieldValue::Record(inner) => inner.flatten_into(Some(&key), out),
                value => {
                    out.insert(key, value.to_json_value());
                }
            }
        }
    }

    /// Select, flatten, and encode as a single-line JSON object
    pub fn to_json(&self) -> Result<String> {
        let flat = self.select_loggable().flatten();
        Ok(serde_json::to_string(&Value::Object(flat))?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Identifier of a logging stream, e.g. `Conn::LOG`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
