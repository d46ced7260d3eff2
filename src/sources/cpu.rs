//! CPU time spent in each mode, from the aggregate line of `/proc/stat`
//!
//! Every column is a COUNTER in hundredths of a second, so the stored rate is
//! the percentage of one CPU, bounded by `100 * cpus`.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use async_trait::async_trait;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::archive::{Archive, ArchiveGroup, ConsolidationFunction};
use crate::datasource::{DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::plugin::{Plugin, Source};
use crate::sample::{Readings, SampleValue};

pub const NAME: &str = "cpu";

/// Clock ticks per second used by `/proc/stat`
const USER_HZ: u64 = 100;

const STAT_FILE: &str = "/proc/stat";

const COLUMNS: [(&str, &str); 9] = [
    ("user", "CPU time spent by normal programs and daemons."),
    ("nice", "CPU time spent by nice(1)d programs."),
    ("system", "CPU time spent by the kernel in system activities."),
    ("idle", "Idle CPU time."),
    (
        "iowait",
        "CPU time spent waiting for I/O operations to finish when there is nothing else to do.",
    ),
    ("irq", "CPU time spent handling interrupts."),
    ("softirq", "CPU time spent handling \"batched\" interrupts."),
    (
        "steal",
        "CPU time that a virtual CPU had runnable tasks, but the virtual CPU itself was not running.",
    ),
    (
        "guest",
        "CPU time spent running a virtual CPU for guest operating systems under the control of the Linux kernel.",
    ),
];

pub struct CpuSource {
    stat_file: PathBuf,
}

impl CpuSource {
    pub fn new() -> Self {
        Self::with_stat_file(STAT_FILE)
    }

    pub fn with_stat_file(stat_file: impl Into<PathBuf>) -> Self {
        Self {
            stat_file: stat_file.into(),
        }
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`. Columns missing on older
/// kernels are left out of the readings.
pub fn parse_stat(stat: &str) -> anyhow::Result<Readings> {
    let Some(line) = stat.lines().next() else {
        bail!("empty stat file");
    };

    let mut fields = line.split_whitespace();
    if fields.next() != Some("cpu") {
        bail!("unexpected first line {line:?}");
    }

    let mut readings = Readings::new();
    for ((column, _), field) in COLUMNS.iter().zip(fields) {
        let ticks: u64 = field
            .parse()
            .with_context(|| format!("invalid value {field:?} of column {column}"))?;
        readings.insert(column.to_string(), SampleValue::from(ticks * 100 / USER_HZ));
    }
    Ok(readings)
}

#[async_trait]
impl Source for CpuSource {
    fn name(&self) -> &str {
        NAME
    }

    fn update_interval(&self) -> u64 {
        300
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        let stat = tokio::fs::read_to_string(&self.stat_file)
            .await
            .with_context(|| format!("could not read {}", self.stat_file.display()))?;
        parse_stat(&stat)
    }
}

fn cpu_count() -> usize {
    System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()))
        .cpus()
        .len()
        .max(1)
}

fn configure_source(
    source: CpuSource,
    cpus: usize,
    data_dir: &Path,
) -> Result<Plugin, ConfigurationError> {
    let mut plugin = Plugin::new(source, data_dir)?;
    let archives = vec![Archive::Group(ArchiveGroup::with_cfs(vec![
        ConsolidationFunction::Average,
    ]))];

    for (column, description) in COLUMNS {
        plugin.add_datasource(
            column,
            DatasourceKind::Counter,
            DatasourceOptions::new()
                .min(0.0)
                .max((cpus * 100) as f64)
                .description(description)
                .archives(archives.clone()),
        )?;
    }

    Ok(plugin)
}

/// Monitor every CPU mode, bounded by the number of CPUs of the machine
pub fn configure(data_dir: &Path) -> Result<Plugin, ConfigurationError> {
    configure_source(CpuSource::new(), cpu_count(), data_dir)
}
