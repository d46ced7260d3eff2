//! System load average

use std::path::Path;

use async_trait::async_trait;
use sysinfo::System;

use crate::datasource::{DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::plugin::{Plugin, Source};
use crate::sample::{Readings, SampleValue};

pub const NAME: &str = "loadavg";

/// Available load average windows
pub const WINDOWS: [&str; 3] = ["1min", "5min", "15min"];

pub const DEFAULT_WINDOWS: [&str; 1] = ["5min"];

#[derive(Debug, Default)]
pub struct LoadAvgSource;

#[async_trait]
impl Source for LoadAvgSource {
    fn name(&self) -> &str {
        NAME
    }

    fn update_interval(&self) -> u64 {
        300
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        let load = System::load_average();

        Ok(Readings::from([
            ("1min".to_string(), SampleValue::from(load.one)),
            ("5min".to_string(), SampleValue::from(load.five)),
            ("15min".to_string(), SampleValue::from(load.fifteen)),
        ]))
    }
}

/// Monitor the given load average windows
pub fn configure<S: AsRef<str>>(
    windows: &[S],
    data_dir: &Path,
) -> Result<Plugin, ConfigurationError> {
    let mut plugin = Plugin::new(LoadAvgSource, data_dir)?;

    for window in windows.iter().map(AsRef::as_ref) {
        if !WINDOWS.contains(&window) {
            return Err(ConfigurationError::InvalidPlugin {
                name: NAME.to_string(),
                reason: format!("invalid load average interval {window:?}"),
            });
        }

        plugin.add_datasource(
            window,
            DatasourceKind::Gauge,
            DatasourceOptions::new()
                .min(0.0)
                .title(format!("{window} load"))
                .description(format!("{window} system load average.")),
        )?;
    }

    Ok(plugin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let plugin = configure(&DEFAULT_WINDOWS, Path::new("/data")).unwrap();

        assert_eq!(plugin.name(), "loadavg");
        assert_eq!(plugin.update_interval(), 300);
        assert_eq!(plugin.datasource_names(), vec!["5min"]);
        assert_eq!(plugin.get_datasource("5min").unwrap().title(), "5min load");
    }

    #[test]
    fn test_invalid_window() {
        assert!(matches!(
            configure(&["2min"], Path::new("/data")),
            Err(ConfigurationError::InvalidPlugin { .. })
        ));
    }

    #[test]
    fn test_every_window() {
        let plugin = configure(&WINDOWS, Path::new("/data")).unwrap();

        assert_eq!(plugin.datasource_names(), vec!["1min", "5min", "15min"]);
        assert!(plugin.get_datasource("1min").unwrap().warning().is_unbounded());
        assert_eq!(
            plugin.get_datasource("15min").unwrap().series_file(),
            Path::new("/data/loadavg.15min.rrd")
        );
    }

    #[tokio::test]
    async fn test_read_data_has_every_window() {
        let readings = LoadAvgSource.read_data().await.unwrap();
        for window in WINDOWS {
            assert!(readings.contains_key(window));
        }
    }
}
