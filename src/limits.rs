//! Limit checking
//!
//! The checker compares the latest stored value of a datasource with the
//! warning and critical intervals of its metadata sidecar and remembers the
//! resulting [`ThresholdState`] in a small state file:
//!
//! ```text
//! <data_dir>/<datasource>.json   limits (read)
//! <data_dir>/<datasource>.rrd    latest value (read)
//! <state_dir>/<datasource>.txt   state token (written on transitions only)
//! ```
//!
//! Because the state file is only rewritten on a transition, its modification
//! time is the time of the last state change.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, instrument, trace, warn};

use crate::archive::ConsolidationFunction;
use crate::datasource::{Metadata, MetadataLimits};
use crate::error::LimitError;
use crate::store::TimeSeriesStore;

/// Default number of trailing unknown samples ignored when looking for the
/// last value
pub const DEFAULT_UNKNOWN_SKIP: usize = 3;

/// Observable state of a datasource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdState {
    Normal,
    Warning,
    Critical,
    Unknown,
}

impl ThresholdState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdState::Normal => "NORMAL",
            ThresholdState::Warning => "WARNING",
            ThresholdState::Critical => "CRITICAL",
            ThresholdState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ThresholdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the full tokens and the four-letter ones of older state files
impl FromStr for ThresholdState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" | "NORM" => Ok(ThresholdState::Normal),
            "WARNING" | "WARN" => Ok(ThresholdState::Warning),
            "CRITICAL" | "CRIT" => Ok(ThresholdState::Critical),
            "UNKNOWN" | "UNKN" => Ok(ThresholdState::Unknown),
            other => Err(other.to_string()),
        }
    }
}

/// Result of checking one datasource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub previous: ThresholdState,
    pub current: ThresholdState,
    /// Value the state was derived from (NaN when unknown)
    pub value: f64,
}

impl Transition {
    pub fn is_change(&self) -> bool {
        self.previous != self.current
    }
}

/// Changed datasources of a batch check, keyed by datasource name
pub type Transitions = BTreeMap<String, Transition>;

/// Derive the state for `value` by strict precedence:
/// UNKNOWN > CRITICAL > WARNING > NORMAL
pub fn evaluate(limits: &MetadataLimits, value: f64) -> ThresholdState {
    if value.is_nan() {
        ThresholdState::Unknown
    } else if limits.critical.is_violated_by(value) {
        ThresholdState::Critical
    } else if limits.warning.is_violated_by(value) {
        ThresholdState::Warning
    } else {
        ThresholdState::Normal
    }
}

/// Checks datasources for state changes
pub struct LimitChecker {
    data_dir: PathBuf,
    state_dir: PathBuf,
    unknown_skip: usize,
    store: Arc<dyn TimeSeriesStore>,

    /// Serializes checks of the same datasource
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LimitChecker {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        store: Arc<dyn TimeSeriesStore>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            state_dir: state_dir.into(),
            unknown_skip: DEFAULT_UNKNOWN_SKIP,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_unknown_skip(mut self, unknown_skip: usize) -> Self {
        self.unknown_skip = unknown_skip;
        self
    }

    pub fn state_file(&self, name: &str) -> PathBuf {
        self.state_dir.join(format!("{name}.txt"))
    }

    fn metadata_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.json"))
    }

    fn series_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.rrd"))
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Load the limits of a datasource from its metadata sidecar
    pub async fn load_limits(&self, name: &str) -> Result<MetadataLimits, LimitError> {
        let path = self.metadata_file(name);
        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| LimitError::MetadataIo {
                    path: path.display().to_string(),
                    source,
                })?;
        let metadata: Metadata =
            serde_json::from_str(&content).map_err(|source| LimitError::MetadataFormat {
                path: path.display().to_string(),
                source,
            })?;

        Ok(metadata.limits)
    }

    /// Last stored value, ignoring up to `unknown_skip` trailing unknowns
    pub async fn last_value(&self, name: &str) -> Result<f64, LimitError> {
        let rows = self
            .store
            .fetch(&self.series_file(name), ConsolidationFunction::Average)
            .await?;

        let mut value = f64::NAN;
        let mut skipped = 0;
        for row in rows.values().rev() {
            value = row.last().copied().unwrap_or(f64::NAN);
            if !(value.is_nan() && skipped < self.unknown_skip) {
                break;
            }
            skipped += 1;
        }

        trace!("last value of {name} is {value} ({skipped} unknown skipped)");
        Ok(value)
    }

    /// Previously persisted state; NORMAL when there is none, UNKNOWN when
    /// the state file is corrupted
    pub async fn load_state(&self, name: &str) -> ThresholdState {
        self.read_state(name).await.0
    }

    /// Persisted state and whether the state file holds an invalid token
    async fn read_state(&self, name: &str) -> (ThresholdState, bool) {
        let path = self.state_file(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match content.trim().parse() {
                Ok(state) => (state, false),
                Err(token) => {
                    warn!(
                        "{} state file contained corrupted state value {token:?}",
                        path.display()
                    );
                    (ThresholdState::Unknown, true)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (ThresholdState::Normal, false),
            Err(e) => {
                warn!("could not read state file {}: {e}", path.display());
                (ThresholdState::Unknown, false)
            }
        }
    }

    async fn store_state(&self, name: &str, state: ThresholdState) -> Result<(), LimitError> {
        let path = self.state_file(name);
        let write_error = |source| LimitError::StateWrite {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.state_dir)
            .await
            .map_err(write_error)?;
        tokio::fs::write(&path, state.as_str())
            .await
            .map_err(write_error)
    }

    /// Check one datasource and persist its state if it changed
    #[instrument(skip(self))]
    pub async fn check(&self, name: &str) -> Result<Transition, LimitError> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let limits = self.load_limits(name).await?;
        if limits.warning.is_unbounded() && limits.critical.is_unbounded() {
            return Err(LimitError::NoLimitsConfigured(name.to_string()));
        }

        let value = self.last_value(name).await?;
        let (previous, corrupted) = self.read_state(name).await;
        let current = evaluate(&limits, value);

        if current != previous {
            debug!("{name}: {previous} -> {current} ({value})");
            self.store_state(name, current).await?;
        } else if corrupted {
            // replaced so the corruption is reported only once
            self.store_state(name, current).await?;
        }

        Ok(Transition {
            previous,
            current,
            value,
        })
    }

    /// Names of all datasources with a metadata sidecar, sorted
    pub async fn datasource_names(&self) -> std::io::Result<Vec<String>> {
        let mut names = vec![];
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(".json")) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Check every known datasource and return those whose state changed
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> Transitions {
        let mut transitions = Transitions::new();

        let names = match self.datasource_names().await {
            Ok(names) => names,
            Err(e) => {
                error!("could not list data directory {}: {e}", self.data_dir.display());
                return transitions;
            }
        };

        for name in names {
            match self.check(&name).await {
                Ok(transition) if transition.is_change() => {
                    transitions.insert(name, transition);
                }
                Ok(_) => {}
                Err(LimitError::NoLimitsConfigured(_)) => {}
                Err(e) => {
                    error!("could not check the limits of datasource {name:?}: {e}");
                }
            }
        }

        transitions
    }
}
