//! Structured log record accepted by the sink.
//!
//! A [`LogRecord`] wraps a JSON object produced by the application's
//! structured logger. Construction validates the shape of the value and
//! parses the mandatory `time` field once, so the write path never has to
//! revisit it.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the field holding the record's creation time.
pub const TIME_FIELD: &str = "time";

/// Reasons a value cannot be accepted as a log record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The value is not a key/value mapping.
    #[error("record must be an object, got {0}")]
    NotAnObject(&'static str),
    /// The mapping has no usable `time` field.
    #[error("record must have a time field")]
    MissingTime,
    /// The `time` field could not be interpreted as a point in time.
    #[error("record time field is not a valid timestamp: {0}")]
    InvalidTime(String),
}

/// A validated structured log record.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    fields: Map<String, Value>,
    time: DateTime<Utc>,
}

impl LogRecord {
    /// Validate `value` and build a record from it.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(fields) => Self::from_fields(fields),
            other => Err(RecordError::NotAnObject(kind_of(&other))),
        }
    }

    /// Build a record from an already destructured mapping.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, RecordError> {
        let time = parse_time(fields.get(TIME_FIELD))?;
        Ok(Self { fields, time })
    }

    /// All fields of the record, including `time`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a single field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Parsed creation time.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Seconds since the Unix epoch with sub-second precision.
    pub fn unix_timestamp(&self) -> f64 {
        self.time.timestamp() as f64 + f64::from(self.time.timestamp_subsec_nanos()) / 1e9
    }

    /// Consume the record, returning its fields.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl TryFrom<Value> for LogRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fields.get("msg").and_then(Value::as_str) {
            Some(msg) => write!(f, "{} - {}", self.time.to_rfc3339(), msg),
            None => write!(f, "{}", self.time.to_rfc3339()),
        }
    }
}

fn parse_time(raw: Option<&Value>) -> Result<DateTime<Utc>, RecordError> {
    match raw {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(RecordError::MissingTime),
        Some(Value::String(s)) if s.is_empty() => Err(RecordError::MissingTime),
        // Zero is falsy, like the other missing markers.
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err(RecordError::MissingTime),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RecordError::InvalidTime(format!("{s}: {e}"))),
        // Numeric times are epoch milliseconds.
        Some(Value::Number(n)) => match n.as_i64() {
            Some(millis) => Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| RecordError::InvalidTime(n.to_string())),
            None => {
                let nanos = n.as_f64().map(|ms| (ms * 1e6).round()).unwrap_or(f64::NAN);
                if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
                    return Err(RecordError::InvalidTime(n.to_string()));
                }
                Ok(Utc.timestamp_nanos(nanos as i64))
            }
        },
        Some(other) => Err(RecordError::InvalidTime(format!(
            "unsupported {} value",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
