//! Hardware temperatures in °C
//!
//! One datasource per component label. When the sensor reports a critical
//! temperature it becomes the upper critical bound of the datasource.

use std::path::Path;

use async_trait::async_trait;
use sysinfo::Components;
use tracing::warn;

use crate::datasource::{DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::plugin::{Plugin, Source};
use crate::sample::{Readings, SampleValue};

pub const NAME: &str = "temperature";

pub struct TemperatureSource {
    components: Components,
}

impl TemperatureSource {
    pub fn new() -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
        }
    }
}

impl Default for TemperatureSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for TemperatureSource {
    fn name(&self) -> &str {
        NAME
    }

    fn update_interval(&self) -> u64 {
        300
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        self.components.refresh(false);

        let mut readings = Readings::new();
        for component in self.components.list() {
            readings
                .entry(component.label().to_string())
                .or_insert_with(|| SampleValue::from(component.temperature()));
        }
        Ok(readings)
    }
}

/// Default options for a component, bounded by its critical temperature
pub fn datasource_options(label: &str, critical: Option<f32>) -> DatasourceOptions {
    let mut defaults = DatasourceOptions::new()
        .title(label)
        .description(format!("Temperature of sensor {label}."));

    if let Some(critical) = critical.filter(|c| c.is_finite() && *c > 0.0) {
        defaults = defaults.critical(format!(":{critical:.0}"));
    }

    defaults
}

/// Monitor every component that reports a temperature
pub fn configure(data_dir: &Path) -> Result<Plugin, ConfigurationError> {
    let source = TemperatureSource::new();
    let components: Vec<(String, Option<f32>)> = source
        .components
        .list()
        .iter()
        .filter(|component| component.temperature().is_some())
        .map(|component| (component.label().to_string(), component.critical()))
        .collect();

    let mut plugin = Plugin::new(source, data_dir)?;
    for (label, critical) in components {
        let result = plugin.add_datasource(
            &label,
            DatasourceKind::Gauge,
            datasource_options(&label, critical),
        );

        match result {
            Ok(()) => {}
            Err(
                e @ (ConfigurationError::DuplicateDatasourceName(_)
                | ConfigurationError::DuplicateSafeName(_)),
            ) => warn!("skipping component {label:?}: {e}"),
            Err(e) => return Err(e),
        }
    }

    Ok(plugin)
}
