//! Sources and plugins
//!
//! A [`Source`] is the adapter that reads raw values from the system. A
//! [`Plugin`] wraps one source together with the ordered collection of
//! datasources it feeds. Datasources are added and removed while the plugin is
//! configured; once the plugin is handed to the scheduler the collection is
//! fixed.
//!
//! ```text
//! Plugin "loadavg" (every 300s)
//!   ├── Source::read_data() -> {"1min": 0.1, "5min": 0.2, "15min": 0.3}
//!   └── datasources: [5min] -> loadavg.5min.rrd / loadavg.5min.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, error, instrument};

use crate::datasource::{Datasource, DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::sample::Readings;
use crate::store::TimeSeriesStore;

/// Producer of raw values for one plugin
#[async_trait]
pub trait Source: Send {
    /// Unique name of the plugin, used as file name prefix
    fn name(&self) -> &str;

    /// Seconds between two reads
    fn update_interval(&self) -> u64;

    /// Read the current values, keyed by datasource name
    async fn read_data(&mut self) -> anyhow::Result<Readings>;
}

/// Outcome of one plugin cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Datasources that received a value
    pub updated: Vec<String>,

    /// Datasources without a value in the readings
    pub missing: Vec<String>,
}

/// A source together with its datasources
pub struct Plugin {
    source: Box<dyn Source>,
    datasources: Vec<Datasource>,
    data_dir: PathBuf,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name())
            .field("update_interval", &self.update_interval())
            .field("datasources", &self.datasource_names())
            .finish()
    }
}

impl Plugin {
    /// Wrap `source`, storing datasource files inside `data_dir`
    pub fn new(
        source: impl Source + 'static,
        data_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigurationError> {
        if source.update_interval() == 0 {
            return Err(ConfigurationError::InvalidPlugin {
                name: source.name().to_string(),
                reason: "update interval must be positive".to_string(),
            });
        }

        Ok(Self {
            source: Box::new(source),
            datasources: vec![],
            data_dir: data_dir.into(),
        })
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn update_interval(&self) -> u64 {
        self.source.update_interval()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn datasources(&self) -> &[Datasource] {
        &self.datasources
    }

    pub fn datasource_names(&self) -> Vec<&str> {
        self.datasources.iter().map(Datasource::name).collect()
    }

    pub fn datasource_safe_names(&self) -> Vec<&str> {
        self.datasources.iter().map(Datasource::safe_name).collect()
    }

    /// Add a datasource; names and safe names must be unique in the plugin
    pub fn add_datasource(
        &mut self,
        name: &str,
        kind: DatasourceKind,
        options: DatasourceOptions,
    ) -> Result<(), ConfigurationError> {
        debug!("adding datasource {name} to plugin {}", self.name());

        let datasource = Datasource::new(
            self.name(),
            self.update_interval(),
            &self.data_dir,
            name,
            kind,
            options,
        )?;

        if self.datasources.iter().any(|ds| ds.name() == name) {
            return Err(ConfigurationError::DuplicateDatasourceName(name.to_string()));
        }
        if self
            .datasources
            .iter()
            .any(|ds| ds.safe_name() == datasource.safe_name())
        {
            return Err(ConfigurationError::DuplicateSafeName(
                datasource.safe_name().to_string(),
            ));
        }

        self.datasources.push(datasource);
        Ok(())
    }

    /// Rebuild an existing datasource with `overrides` applied on top of the
    /// options it was created with; fields left unset keep their value
    pub fn configure_datasource(
        &mut self,
        name: &str,
        overrides: DatasourceOptions,
    ) -> Result<(), ConfigurationError> {
        debug!("configuring datasource {name} of plugin {}", self.name());

        let position = self
            .datasources
            .iter()
            .position(|ds| ds.name() == name)
            .ok_or_else(|| ConfigurationError::DatasourceNotFound(name.to_string()))?;

        let current = &self.datasources[position];
        let datasource = Datasource::new(
            self.name(),
            self.update_interval(),
            &self.data_dir,
            name,
            current.kind(),
            current.options().clone().merge(overrides),
        )?;

        if self
            .datasources
            .iter()
            .enumerate()
            .any(|(i, ds)| i != position && ds.safe_name() == datasource.safe_name())
        {
            return Err(ConfigurationError::DuplicateSafeName(
                datasource.safe_name().to_string(),
            ));
        }

        self.datasources[position] = datasource;
        Ok(())
    }

    /// Remove the datasource with the given name, if present
    pub fn remove_datasource(&mut self, name: &str) -> Option<Datasource> {
        debug!("removing datasource {name} from plugin {}", self.name());
        let position = self.datasources.iter().position(|ds| ds.name() == name)?;
        Some(self.datasources.remove(position))
    }

    pub fn get_datasource(&self, name: &str) -> Result<&Datasource, ConfigurationError> {
        self.datasources
            .iter()
            .find(|ds| ds.name() == name)
            .ok_or_else(|| ConfigurationError::DatasourceNotFound(name.to_string()))
    }

    /// Read fresh values and persist them into every datasource.
    ///
    /// A datasource without a value is logged and skipped; any other error
    /// aborts the cycle and is returned to the caller.
    #[instrument(skip(self, store), fields(plugin = %self.name()))]
    pub async fn update(&mut self, store: &dyn TimeSeriesStore) -> anyhow::Result<CycleReport> {
        debug!("reading data from sensors");
        let readings = self
            .source
            .read_data()
            .await
            .context("failed to read data from sensors")?;

        let mut report = CycleReport::default();

        for datasource in &self.datasources {
            let Some(value) = readings.get(datasource.name()) else {
                error!(
                    "provided data do not contain value for datasource {:?}",
                    datasource.name()
                );
                report.missing.push(datasource.name().to_string());
                continue;
            };

            datasource
                .update(store, value)
                .await
                .with_context(|| format!("failed to update datasource {:?}", datasource.name()))?;
            report.updated.push(datasource.name().to_string());
        }

        Ok(report)
    }
}
