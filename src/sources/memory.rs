//! Memory usage

use std::path::Path;

use async_trait::async_trait;
use sysinfo::System;

use crate::archive::{Archive, ArchiveGroup, ConsolidationFunction};
use crate::datasource::{DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::plugin::{Plugin, Source};
use crate::sample::{Readings, SampleValue};

pub const NAME: &str = "memory";

const DATASOURCES: [(&str, &str); 4] = [
    ("used", "Memory used by the system and applications."),
    ("free", "Memory that is not used for anything at all."),
    ("available", "Memory available for starting new applications."),
    ("swap", "Memory evicted from RAM to the swap space."),
];

pub struct MemorySource {
    system: System,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MemorySource {
    fn name(&self) -> &str {
        NAME
    }

    fn update_interval(&self) -> u64 {
        300
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        self.system.refresh_memory();

        Ok(Readings::from([
            ("used".to_string(), SampleValue::from(self.system.used_memory())),
            ("free".to_string(), SampleValue::from(self.system.free_memory())),
            (
                "available".to_string(),
                SampleValue::from(self.system.available_memory()),
            ),
            ("swap".to_string(), SampleValue::from(self.system.used_swap())),
        ]))
    }
}

/// Monitor memory and swap usage in bytes
pub fn configure(data_dir: &Path) -> Result<Plugin, ConfigurationError> {
    let mut plugin = Plugin::new(MemorySource::new(), data_dir)?;

    // averages only, min/max of memory usage carry little information
    let archives = vec![Archive::Group(ArchiveGroup::with_cfs(vec![
        ConsolidationFunction::Average,
    ]))];

    for (name, description) in DATASOURCES {
        plugin.add_datasource(
            name,
            DatasourceKind::Gauge,
            DatasourceOptions::new()
                .min(0.0)
                .description(description)
                .archives(archives.clone()),
        )?;
    }

    Ok(plugin)
}
