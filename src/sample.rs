//! Raw values produced by sources

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// One reading handed to the store.
///
/// Integers are kept apart from floats because counter-like datasources only
/// accept integral updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Integer(i64),
    Float(f64),
    Unknown,
}

/// Values of one cycle, keyed by datasource name
pub type Readings = HashMap<String, SampleValue>;

impl SampleValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            SampleValue::Integer(value) => *value as f64,
            SampleValue::Float(value) => *value,
            SampleValue::Unknown => f64::NAN,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Integer(value) => write!(f, "{value}"),
            SampleValue::Float(value) if value.is_finite() => write!(f, "{value}"),
            SampleValue::Float(_) | SampleValue::Unknown => f.write_str("U"),
        }
    }
}

impl From<i64> for SampleValue {
    fn from(value: i64) -> Self {
        SampleValue::Integer(value)
    }
}

impl From<u64> for SampleValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(SampleValue::Float(value as f64), SampleValue::Integer)
    }
}

impl From<usize> for SampleValue {
    fn from(value: usize) -> Self {
        SampleValue::from(value as u64)
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Float(value)
    }
}

impl From<f32> for SampleValue {
    fn from(value: f32) -> Self {
        SampleValue::Float(f64::from(value))
    }
}

impl From<Option<f32>> for SampleValue {
    fn from(value: Option<f32>) -> Self {
        value.map_or(SampleValue::Unknown, SampleValue::from)
    }
}

/// Parses numeric strings as read from `/proc` or command output
impl FromStr for SampleValue {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "U" {
            return Ok(SampleValue::Unknown);
        }
        if let Ok(value) = s.parse::<i64>() {
            return Ok(SampleValue::Integer(value));
        }
        s.parse::<f64>().map(SampleValue::Float)
    }
}
