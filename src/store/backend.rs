//! Time-series store trait definition
//!
//! The store is an external round-robin database. The daemon only ever
//! creates a series, appends a value at "now" and fetches consolidated rows,
//! so the trait is kept to exactly those operations plus an existence check.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::archive::ConsolidationFunction;
use crate::datasource::DatasourceKind;
use crate::sample::SampleValue;

/// Rows returned by a fetch: timestamp → one value per signal, oldest first
pub type FetchedRows = BTreeMap<i64, Vec<f64>>;

/// One signal stored inside a series file
#[derive(Debug, Clone, PartialEq)]
pub enum SignalDefinition {
    /// Value written by updates
    Raw {
        name: String,
        kind: DatasourceKind,
        heartbeat: u64,
        min: Option<f64>,
        max: Option<f64>,
    },

    /// Copy of `source` with unknown samples replaced by `substitute`
    UnknownSubstitute {
        name: String,
        source: String,
        substitute: f64,
    },
}

impl fmt::Display for SignalDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDefinition::Raw {
                name,
                kind,
                heartbeat,
                min,
                max,
            } => write!(
                f,
                "DS:{name}:{kind}:{heartbeat}:{}:{}",
                format_bound(*min),
                format_bound(*max)
            ),
            SignalDefinition::UnknownSubstitute {
                name,
                source,
                substitute,
            } => write!(
                f,
                "DS:{name}:COMPUTE:{source},UN,{substitute:?},{source},IF"
            ),
        }
    }
}

/// Format an optional bound the way the store expects it (`U` = unbounded)
fn format_bound(bound: Option<f64>) -> String {
    match bound {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => format!("{value:.0}"),
        Some(value) => value.to_string(),
        None => "U".to_string(),
    }
}

/// Everything the store needs to create a series file
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLayout {
    /// Seconds between primary data points
    pub step: u64,

    pub signals: Vec<SignalDefinition>,

    /// Rendered archive definitions (`RRA:...`)
    pub archives: Vec<String>,
}

/// Trait for round-robin time-series stores
///
/// Implementations must be `Send + Sync`; a single store is shared by every
/// scheduled plugin and the limit checker.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Whether a series file exists at `path`
    async fn exists(&self, path: &Path) -> StorageResult<bool>;

    /// Create a new series file. Must fail instead of overwriting.
    async fn create(&self, path: &Path, layout: &SeriesLayout) -> StorageResult<()>;

    /// Append `value` to the series at the current time
    async fn update(&self, path: &Path, value: &SampleValue) -> StorageResult<()>;

    /// Fetch consolidated rows of the series
    async fn fetch(&self, path: &Path, cf: ConsolidationFunction) -> StorageResult<FetchedRows>;
}
