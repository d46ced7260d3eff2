//! In-memory store (no persistence)
//!
//! Keeps every series in a map guarded by a mutex. It mirrors the observable
//! behaviour of the command adapter closely enough for tests and dry runs:
//!
//! - `create` refuses to overwrite an existing series
//! - `update` fails for unknown series and evaluates unknown-substitute
//!   signals
//! - `fetch` returns all rows ordered by timestamp
//!
//! Failures can be injected with [`MemoryStore::fail_updates`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::backend::{FetchedRows, SeriesLayout, SignalDefinition, TimeSeriesStore};
use super::error::{StorageError, StorageResult};
use crate::archive::ConsolidationFunction;
use crate::sample::SampleValue;

#[derive(Debug, Clone)]
struct MemorySeries {
    layout: SeriesLayout,
    rows: FetchedRows,
}

impl MemorySeries {
    fn row_for(&self, value: &SampleValue) -> Vec<f64> {
        let raw = value.as_f64();
        self.layout
            .signals
            .iter()
            .map(|signal| match signal {
                SignalDefinition::Raw { .. } => raw,
                SignalDefinition::UnknownSubstitute { substitute, .. } if raw.is_nan() => {
                    *substitute
                }
                SignalDefinition::UnknownSubstitute { .. } => raw,
            })
            .collect()
    }
}

/// In-memory time-series store
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: Mutex<HashMap<PathBuf, MemorySeries>>,
    creations: AtomicUsize,
    updates: AtomicUsize,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `create` calls
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    /// Number of successful `update` calls
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Make every following `update` fail (or succeed again)
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Layout the series at `path` was created with
    pub fn layout(&self, path: &Path) -> Option<SeriesLayout> {
        self.lock().get(path).map(|series| series.layout.clone())
    }

    /// Insert a raw row at an explicit timestamp, creating the series with
    /// `layout` if needed
    pub fn insert_row(&self, path: &Path, layout: &SeriesLayout, timestamp: i64, values: Vec<f64>) {
        self.lock()
            .entry(path.to_path_buf())
            .or_insert_with(|| MemorySeries {
                layout: layout.clone(),
                rows: FetchedRows::new(),
            })
            .rows
            .insert(timestamp, values);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, MemorySeries>> {
        // a poisoned map is still structurally valid
        self.series
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        Ok(self.lock().contains_key(path))
    }

    async fn create(&self, path: &Path, layout: &SeriesLayout) -> StorageResult<()> {
        let mut series = self.lock();
        if series.contains_key(path) {
            return Err(StorageError::SeriesExists(path.to_path_buf()));
        }

        debug!("creating in-memory series {}", path.display());
        series.insert(
            path.to_path_buf(),
            MemorySeries {
                layout: layout.clone(),
                rows: FetchedRows::new(),
            },
        );
        self.creations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, path: &Path, value: &SampleValue) -> StorageResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StorageError::CommandFailed {
                command: "memory update".to_string(),
                code: Some(1),
                output: "injected failure".to_string(),
            });
        }

        let mut series = self.lock();
        let entry = series
            .get_mut(path)
            .ok_or_else(|| StorageError::SeriesNotFound(path.to_path_buf()))?;

        let row = entry.row_for(value);
        entry.rows.insert(Utc::now().timestamp(), row);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(&self, path: &Path, _cf: ConsolidationFunction) -> StorageResult<FetchedRows> {
        self.lock()
            .get(path)
            .map(|series| series.rows.clone())
            .ok_or_else(|| StorageError::SeriesNotFound(path.to_path_buf()))
    }
}
