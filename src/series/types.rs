//! Core data types for time-series input
//!
//! This module defines the values the query engine reads:
//! - `DataPoint`: A single timestamped observation
//! - `Value`: The typed payload of a data point
//! - `TimeRange`: A half-open time interval

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Typed value carried by a data point
///
/// Integers are listed before decimals so that JSON input like `3` stays an
/// integer while `3.5` becomes a decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Whole number
    Integer(i64),
    /// Floating point number
    Decimal(f64),
    /// Boolean flag
    Boolean(bool),
    /// Free text
    Text(String),
}

impl Value {
    /// Parse a raw textual cell, preferring the narrowest numeric type
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(d) = raw.parse::<f64>() {
            return Value::Decimal(d);
        }
        match raw {
            "true" | "TRUE" | "True" => Value::Boolean(true),
            "false" | "FALSE" | "False" => Value::Boolean(false),
            _ => Value::Text(raw.to_string()),
        }
    }

    /// Numeric view of this value
    ///
    /// Booleans map to `1.0`/`0.0`, text is parsed as a decimal.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => Some(*d),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Decimal(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A single time-series data point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPoint {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// The observed value
    pub value: Value,
}

impl DataPoint {
    /// Create a data point at a specific timestamp
    pub fn new(timestamp: i64, value: impl Into<Value>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    /// Create a decimal data point
    pub fn decimal(timestamp: i64, value: f64) -> Self {
        Self::new(timestamp, Value::Decimal(value))
    }

    /// Numeric view of the value, if it has one
    pub fn as_decimal(&self) -> Option<f64> {
        self.value.as_decimal()
    }
}

/// Time range for windowed aggregation (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in milliseconds
    pub start: i64,
    /// End timestamp (exclusive), in milliseconds
    pub end: i64,
}

impl TimeRange {
    /// Create a time range, returning None if invalid
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        let range = Self { start, end };
        range.is_valid().then_some(range)
    }

    /// Whether start is strictly before end
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Get the duration in milliseconds, saturating at `i64::MAX`
    pub fn duration_millis(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

/// Parse an instant given as RFC 3339, a naive `YYYY-MM-DD HH:MM:SS` or epoch millis
pub fn parse_instant(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    raw.parse::<i64>().ok()
}

/// Format epoch millis as RFC 3339 with millisecond precision
pub fn format_instant(timestamp: i64) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp.to_string())
}
