//! Threshold intervals
//!
//! Warning and critical thresholds are written as compact interval strings:
//!
//! | input       | parsed                  |
//! |-------------|-------------------------|
//! | `""`        | unbounded               |
//! | `"10"`      | `max = 10`              |
//! | `"10:"`     | `min = 10`              |
//! | `":20"`     | `max = 20`              |
//! | `"10:20"`   | `min = 10`, `max = 20`  |
//!
//! A value is *outside* an interval when it is below a present `min` or above
//! a present `max`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Parsed interval with optional bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Interval {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Parse `"min:max" | "min:" | ":max" | "max" | ""`
    pub fn parse(interval: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidInterval(interval.to_string());

        if interval.matches(':').count() > 1 {
            return Err(invalid());
        }

        let bound = |value: &str| value.trim().parse::<f64>().map_err(|_| invalid());

        let trimmed = interval.strip_prefix(':').unwrap_or(interval);
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        match trimmed.split_once(':') {
            None => Ok(Self::new(None, Some(bound(trimmed)?))),
            Some((min, "")) => Ok(Self::new(Some(bound(min)?), None)),
            Some((min, max)) => Ok(Self::new(Some(bound(min)?), Some(bound(max)?))),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether `value` lies outside of the present bounds
    pub fn is_violated_by(&self, value: f64) -> bool {
        self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max)
    }
}

impl FromStr for Interval {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::parse(s)
    }
}
