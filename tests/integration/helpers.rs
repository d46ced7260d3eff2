//! Helper functions for integration tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sensor_monitoring::{
    Datasource, DatasourceKind, DatasourceOptions, LimitChecker, Readings, SampleValue, Source,
    archive::ConsolidationFunction,
    store::{MemoryStore, TimeSeriesStore},
};
use tempfile::TempDir;

pub const PLUGIN: &str = "test";

/// First timestamp used for inserted rows
pub const T0: i64 = 1_350_000_000;

pub struct TestDirs {
    pub data: TempDir,
    pub state: TempDir,
}

pub fn create_test_dirs() -> TestDirs {
    TestDirs {
        data: tempfile::tempdir().unwrap(),
        state: tempfile::tempdir().unwrap(),
    }
}

pub fn create_checker(dirs: &TestDirs, store: Arc<MemoryStore>) -> LimitChecker {
    LimitChecker::new(dirs.data.path(), dirs.state.path(), store)
}

/// Datasource `test.<name>` with its series and sidecar already persisted
pub async fn create_persisted_datasource(
    store: &MemoryStore,
    data_dir: &Path,
    name: &str,
    options: DatasourceOptions,
) -> Datasource {
    let datasource =
        Datasource::new(PLUGIN, 300, data_dir, name, DatasourceKind::Gauge, options).unwrap();
    datasource.ensure_persisted(store).await.unwrap();
    datasource
}

/// Append rows (one value per signal) after the existing ones, 300s apart
pub async fn push_rows(store: &MemoryStore, datasource: &Datasource, rows: &[Vec<f64>]) {
    let layout = datasource.layout();
    let start = store
        .fetch(&datasource.series_file(), ConsolidationFunction::Average)
        .await
        .ok()
        .and_then(|existing| existing.keys().next_back().map(|last| last + 300))
        .unwrap_or(T0);

    for (i, row) in rows.iter().enumerate() {
        store.insert_row(
            &datasource.series_file(),
            &layout,
            start + 300 * i as i64,
            row.clone(),
        );
    }
}

/// Append single-signal values
pub async fn push_values(store: &MemoryStore, datasource: &Datasource, values: &[f64]) {
    let rows: Vec<Vec<f64>> = values.iter().map(|value| vec![*value]).collect();
    push_rows(store, datasource, &rows).await;
}

pub fn read_state(dirs: &TestDirs, name: &str) -> Option<String> {
    std::fs::read_to_string(dirs.state.path().join(format!("{name}.txt"))).ok()
}

/// Source returning scripted results, then repeating the last one
pub struct ScriptedSource {
    name: String,
    interval: u64,
    results: Arc<Mutex<VecDeque<Result<Readings, String>>>>,
    last: Result<Readings, String>,
}

impl ScriptedSource {
    pub fn new(name: &str, interval: u64, results: Vec<Result<Readings, String>>) -> Self {
        Self {
            name: name.to_string(),
            interval,
            results: Arc::new(Mutex::new(results.into())),
            last: Err("no data".to_string()),
        }
    }

    pub fn values(name: &str, values: &[(&str, SampleValue)]) -> Self {
        Self::new(name, 300, vec![Ok(readings(values))])
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, 300, vec![Err("sensor unavailable".to_string())])
    }
}

pub fn readings(values: &[(&str, SampleValue)]) -> Readings {
    values
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

#[async_trait]
impl Source for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_interval(&self) -> u64 {
        self.interval
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        if let Some(next) = self.results.lock().unwrap().pop_front() {
            self.last = next;
        }
        self.last.clone().map_err(anyhow::Error::msg)
    }
}
