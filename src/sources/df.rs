//! Free or used space on mounted file systems

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sysinfo::Disks;
use tracing::{debug, trace};

use crate::archive::{Archive, ArchiveGroup, RetentionTemplate};
use crate::datasource::{DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::plugin::{Plugin, Source};
use crate::sample::{Readings, SampleValue};

/// File system types never picked up by autoconfiguration
pub const EXCLUDED_FILE_SYSTEMS: [&str; 10] = [
    "none", "unknown", "iso9660", "squashfs", "udf", "romfs", "ramfs", "tmpfs", "devtmpfs",
    "rootfs",
];

/// Lower warning limit as portion of the capacity
pub const WARNING_RATIO: f64 = 0.1;

/// Lower critical limit as portion of the capacity
pub const CRITICAL_RATIO: f64 = 0.05;

const UPDATE_INTERVAL: u64 = 900;
const HEARTBEAT: u64 = 3 * 24 * 3600;

#[derive(Debug, Clone, Default)]
pub struct DfOptions {
    /// Report used rather than free space
    pub used_space: bool,

    /// Report percentage of the capacity rather than bytes
    pub percentage: bool,

    /// Mount points to monitor, all local ones when absent
    pub mount_points: Option<Vec<String>>,
}

impl DfOptions {
    /// Plugin name, e.g. `df_free_absolute`
    pub fn plugin_name(&self) -> String {
        format!(
            "df_{}_{}",
            if self.used_space { "used" } else { "free" },
            if self.percentage { "percent" } else { "absolute" }
        )
    }
}

/// Space of one mounted file system in bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total: u64,
    pub available: u64,
}

impl DiskUsage {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// Value reported for this disk under `options`
    pub fn value(&self, options: &DfOptions) -> SampleValue {
        let bytes = if options.used_space {
            self.used()
        } else {
            self.available
        };

        if !options.percentage {
            SampleValue::from(bytes)
        } else if self.total == 0 {
            SampleValue::Unknown
        } else {
            SampleValue::from(bytes as f64 / self.total as f64 * 100.0)
        }
    }
}

/// Whether a mount point is picked up by autoconfiguration
pub fn is_monitored(file_system: &str, mount_point: &str) -> bool {
    !EXCLUDED_FILE_SYSTEMS.contains(&file_system) && !mount_point.starts_with("/media/")
}

/// Usage of every local disk, keyed by mount point
fn disk_usage(disks: &Disks) -> HashMap<String, (String, DiskUsage)> {
    disks
        .list()
        .iter()
        .map(|disk| {
            (
                disk.mount_point().to_string_lossy().into_owned(),
                (
                    disk.file_system().to_string_lossy().into_owned(),
                    DiskUsage {
                        total: disk.total_space(),
                        available: disk.available_space(),
                    },
                ),
            )
        })
        .collect()
}

pub struct DfSource {
    name: String,
    options: DfOptions,
    disks: Disks,
}

impl DfSource {
    pub fn new(options: DfOptions) -> Self {
        Self {
            name: options.plugin_name(),
            options,
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

#[async_trait]
impl Source for DfSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_interval(&self) -> u64 {
        UPDATE_INTERVAL
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        self.disks.refresh(true);

        let readings: Readings = disk_usage(&self.disks)
            .into_iter()
            .map(|(mount_point, (_, usage))| (mount_point, usage.value(&self.options)))
            .collect();
        trace!("disk readings: {readings:?}");
        Ok(readings)
    }
}

/// Default datasource options for one mount point
pub fn datasource_options(
    options: &DfOptions,
    mount_point: &str,
    usage: &DiskUsage,
) -> DatasourceOptions {
    let what = if options.used_space { "used" } else { "free" };
    let mut defaults = DatasourceOptions::new()
        .min(0.0)
        .heartbeat(HEARTBEAT)
        .step(UPDATE_INTERVAL)
        .archives(vec![Archive::Group(ArchiveGroup::with_templates(vec![
            RetentionTemplate::Week,
            RetentionTemplate::Month,
            RetentionTemplate::Year,
        ]))]);

    if options.percentage {
        defaults = defaults
            .max(100.0)
            .description(format!("Percentage of {what} space on {mount_point}."));
        if !options.used_space {
            defaults = defaults
                .warning(format!("{:.0}:", 100.0 * WARNING_RATIO))
                .critical(format!("{:.0}:", 100.0 * CRITICAL_RATIO));
        }
    } else {
        let capacity = usage.total as f64;
        defaults = defaults
            .max(capacity)
            .description(format!("Amount of {what} space on {mount_point}."));
        if !options.used_space {
            defaults = defaults
                .warning(format!("{:.0}:", capacity * WARNING_RATIO))
                .critical(format!("{:.0}:", capacity * CRITICAL_RATIO));
        }
    }

    defaults
}

/// Monitor the configured mount points, or every local one
pub fn configure(
    options: DfOptions,
    data_dir: &Path,
) -> Result<Plugin, ConfigurationError> {
    let source = DfSource::new(options.clone());
    let mut usage: Vec<_> = disk_usage(&source.disks)
        .into_iter()
        .filter(|(mount_point, (file_system, _))| match &options.mount_points {
            Some(selected) => selected.contains(mount_point),
            None => is_monitored(file_system, mount_point),
        })
        .collect();
    usage.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(selected) = &options.mount_points {
        for mount_point in selected {
            if !usage.iter().any(|(m, _)| m == mount_point) {
                return Err(ConfigurationError::InvalidPlugin {
                    name: options.plugin_name(),
                    reason: format!("{mount_point} is not mounted"),
                });
            }
        }
    }

    let mut plugin = Plugin::new(source, data_dir)?;
    for (mount_point, (_, disk)) in &usage {
        debug!("monitoring {mount_point}");
        plugin.add_datasource(
            mount_point,
            DatasourceKind::Gauge,
            datasource_options(&options, mount_point, disk),
        )?;
    }

    Ok(plugin)
}
