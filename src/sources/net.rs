//! Network traffic per interface
//!
//! Byte counters are stored as COUNTER datasources `<interface>:in` and
//! `<interface>:out`. Counter resets and gaps show up as unknown rates, the
//! clean signal replaces them with zero.

use std::path::Path;

use async_trait::async_trait;
use sysinfo::Networks;
use tracing::debug;

use crate::datasource::{DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::plugin::{Plugin, Source};
use crate::sample::{Readings, SampleValue};

pub const NAME: &str = "net_traffic";

const LOOPBACK: &str = "lo";

pub struct NetSource {
    networks: Networks,
    interfaces: Vec<String>,
}

impl NetSource {
    pub fn new(interfaces: Vec<String>) -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            interfaces,
        }
    }
}

/// Counter readings of the monitored `interfaces` out of
/// `(interface, received, transmitted)` totals
pub fn traffic_readings<'a>(
    totals: impl IntoIterator<Item = (&'a str, u64, u64)>,
    interfaces: &[String],
) -> Readings {
    totals
        .into_iter()
        .filter(|(interface, _, _)| interfaces.iter().any(|i| i == interface))
        .flat_map(|(interface, received, transmitted)| {
            [
                (format!("{interface}:in"), SampleValue::from(received)),
                (format!("{interface}:out"), SampleValue::from(transmitted)),
            ]
        })
        .collect()
}

#[async_trait]
impl Source for NetSource {
    fn name(&self) -> &str {
        NAME
    }

    fn update_interval(&self) -> u64 {
        120
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        self.networks.refresh(true);

        let totals = self.networks.list().iter().map(|(interface, data)| {
            (
                interface.as_str(),
                data.total_received(),
                data.total_transmitted(),
            )
        });
        Ok(traffic_readings(totals, &self.interfaces))
    }
}

/// Monitor the given interfaces
pub fn configure_interfaces(
    mut interfaces: Vec<String>,
    data_dir: &Path,
) -> Result<Plugin, ConfigurationError> {
    interfaces.sort();
    interfaces.dedup();

    let mut plugin = Plugin::new(NetSource::new(interfaces.clone()), data_dir)?;
    for interface in &interfaces {
        debug!("monitoring interface {interface}");
        for (direction, traffic) in [("in", "Incoming"), ("out", "Outgoing")] {
            plugin.add_datasource(
                &format!("{interface}:{direction}"),
                DatasourceKind::Counter,
                DatasourceOptions::new()
                    .min(0.0)
                    .unknown(0.0)
                    .title(format!("{interface} {direction}"))
                    .description(format!("{traffic} traffic on interface {interface}.")),
            )?;
        }
    }

    Ok(plugin)
}

/// Monitor every interface except the loopback
pub fn configure(data_dir: &Path) -> Result<Plugin, ConfigurationError> {
    let interfaces = Networks::new_with_refreshed_list()
        .list()
        .keys()
        .filter(|interface| interface.as_str() != LOOPBACK)
        .cloned()
        .collect();

    configure_interfaces(interfaces, data_dir)
}
