//! Datasources: one named numeric signal of a plugin
//!
//! Every datasource owns two files inside the data directory:
//!
//! ```text
//! <plugin>.<safe_name>.rrd   round-robin series (raw signal, optional clean signal)
//! <plugin>.<safe_name>.json  metadata sidecar (title, description, limits)
//! ```
//!
//! Both files are created lazily on the first update and are never touched
//! again while present. Changing the layout of an existing datasource
//! requires deleting its files manually.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::archive::{Archive, ArchiveGroup};
use crate::error::ConfigurationError;
use crate::interval::Interval;
use crate::sample::SampleValue;
use crate::store::{SeriesLayout, SignalDefinition, StorageResult, TimeSeriesStore};
use crate::util::safe_name;

/// Granularity targeted by the default step, in seconds
const TARGET_STEP: u64 = 300;

/// Default heartbeat as a multiple of the update interval
const HEARTBEAT_FACTOR: f64 = 2.5;

/// How the store interprets successive values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasourceKind {
    /// Stored as-is
    Gauge,
    /// Monotonic counter, stored as rate
    Counter,
    /// Like counter, but may decrease
    Derive,
    /// Counter reset on every read
    Absolute,
}

impl DatasourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasourceKind::Gauge => "GAUGE",
            DatasourceKind::Counter => "COUNTER",
            DatasourceKind::Derive => "DERIVE",
            DatasourceKind::Absolute => "ABSOLUTE",
        }
    }
}

impl fmt::Display for DatasourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasourceKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GAUGE" => Ok(DatasourceKind::Gauge),
            "COUNTER" => Ok(DatasourceKind::Counter),
            "DERIVE" => Ok(DatasourceKind::Derive),
            "ABSOLUTE" => Ok(DatasourceKind::Absolute),
            other => Err(ConfigurationError::InvalidKind(other.to_string())),
        }
    }
}

/// Optional settings of a datasource; everything left `None` gets a default
/// derived from the owning plugin
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasourceOptions {
    pub safe_name: Option<String>,
    pub step: Option<u64>,
    pub heartbeat: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Substitute for unknown samples in the additional clean signal
    pub unknown: Option<f64>,
    pub archives: Option<Vec<Archive>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub warning: Option<String>,
    pub critical: Option<String>,
}

impl DatasourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn safe_name(mut self, safe_name: impl Into<String>) -> Self {
        self.safe_name = Some(safe_name.into());
        self
    }

    pub fn step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn heartbeat(mut self, heartbeat: u64) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn unknown(mut self, substitute: f64) -> Self {
        self.unknown = Some(substitute);
        self
    }

    pub fn archives(mut self, archives: Vec<Archive>) -> Self {
        self.archives = Some(archives);
        self
    }

    pub fn archive_group(self, group: ArchiveGroup) -> Self {
        self.archives(vec![Archive::Group(group)])
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn critical(mut self, critical: impl Into<String>) -> Self {
        self.critical = Some(critical.into());
        self
    }

    /// Overlay every field set in `overrides` onto `self`
    pub fn merge(mut self, overrides: DatasourceOptions) -> Self {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if overrides.$field.is_some() {
                    self.$field = overrides.$field;
                })*
            };
        }
        overlay!(
            safe_name,
            step,
            heartbeat,
            min,
            max,
            unknown,
            archives,
            title,
            description,
            warning,
            critical
        );
        self
    }
}

/// Limits section of the metadata sidecar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataLimits {
    #[serde(default)]
    pub warning: Interval,

    #[serde(default)]
    pub critical: Interval,
}

/// Content of the `<plugin>.<safe_name>.json` sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub update_interval: u64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub limits: MetadataLimits,
}

/// Default step so that at least one sample fits into every poll while
/// aiming for five minute granularity
pub fn default_step(update_interval: u64) -> u64 {
    let polls = (TARGET_STEP as f64 / update_interval as f64).ceil();
    (TARGET_STEP as f64 / polls).round_ties_even() as u64
}

pub fn default_heartbeat(update_interval: u64) -> u64 {
    (update_interval as f64 * HEARTBEAT_FACTOR) as u64
}

/// A fully configured datasource
#[derive(Debug, Clone, PartialEq)]
pub struct Datasource {
    plugin: String,
    name: String,
    safe_name: String,
    kind: DatasourceKind,
    step: u64,
    heartbeat: u64,
    min: Option<f64>,
    max: Option<f64>,
    unknown: Option<f64>,
    archives: Vec<Archive>,
    title: String,
    description: String,
    warning: Interval,
    critical: Interval,
    update_interval: u64,
    data_dir: PathBuf,
    /// Options the datasource was built from, before defaults
    options: DatasourceOptions,
}

impl Datasource {
    /// Build a datasource of `plugin`, applying defaults and validating the
    /// invariants (step > 0, heartbeat >= step, min <= max, parsable limits)
    pub fn new(
        plugin: &str,
        update_interval: u64,
        data_dir: &Path,
        name: &str,
        kind: DatasourceKind,
        options: DatasourceOptions,
    ) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidDatasource {
            name: name.to_string(),
            reason,
        };

        let configured = options.clone();
        let safe_name = safe_name(options.safe_name.as_deref().unwrap_or(name));
        let step = options.step.unwrap_or_else(|| default_step(update_interval));
        let heartbeat = options
            .heartbeat
            .unwrap_or_else(|| default_heartbeat(update_interval));

        if step == 0 {
            return Err(invalid("step must be positive".to_string()));
        }
        if heartbeat < step {
            return Err(invalid(format!(
                "heartbeat {heartbeat} is shorter than step {step}"
            )));
        }
        if let (Some(min), Some(max)) = (options.min, options.max)
            && min > max
        {
            return Err(invalid(format!("min {min} is greater than max {max}")));
        }

        let warning = Interval::parse(options.warning.as_deref().unwrap_or_default())?;
        let critical = Interval::parse(options.critical.as_deref().unwrap_or_default())?;

        Ok(Self {
            plugin: plugin.to_string(),
            name: name.to_string(),
            safe_name,
            kind,
            step,
            heartbeat,
            min: options.min,
            max: options.max,
            unknown: options.unknown,
            archives: options
                .archives
                .unwrap_or_else(|| vec![Archive::Group(ArchiveGroup::default())]),
            title: options.title.unwrap_or_else(|| name.to_string()),
            description: options.description.unwrap_or_default(),
            warning,
            critical,
            update_interval,
            data_dir: data_dir.to_path_buf(),
            options: configured,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn safe_name(&self) -> &str {
        &self.safe_name
    }

    pub fn kind(&self) -> DatasourceKind {
        self.kind
    }

    pub fn options(&self) -> &DatasourceOptions {
        &self.options
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn heartbeat(&self) -> u64 {
        self.heartbeat
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn warning(&self) -> &Interval {
        &self.warning
    }

    pub fn critical(&self) -> &Interval {
        &self.critical
    }

    /// `<plugin>.<safe_name>`, shared by all files of this datasource
    pub fn filename(&self) -> String {
        format!("{}.{}", self.plugin, self.safe_name)
    }

    pub fn series_file(&self) -> PathBuf {
        self.data_dir.join(format!("{}.rrd", self.filename()))
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.filename()))
    }

    /// Signals and archives used when the series file is created
    pub fn layout(&self) -> SeriesLayout {
        let mut signals = vec![SignalDefinition::Raw {
            name: "raw".to_string(),
            kind: self.kind,
            heartbeat: self.heartbeat,
            min: self.min,
            max: self.max,
        }];

        if let Some(substitute) = self.unknown {
            signals.push(SignalDefinition::UnknownSubstitute {
                name: "clean".to_string(),
                source: "raw".to_string(),
                substitute,
            });
        }

        SeriesLayout {
            step: self.step,
            signals,
            archives: self
                .archives
                .iter()
                .flat_map(|archive| archive.definitions(self.step))
                .collect(),
        }
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            update_interval: self.update_interval,
            title: self.title.clone(),
            description: self.description.clone(),
            limits: MetadataLimits {
                warning: self.warning,
                critical: self.critical,
            },
        }
    }

    /// Create the series and metadata files if they do not exist yet.
    ///
    /// The two checks are independent: a missing sidecar is written even when
    /// the series already exists, and vice versa.
    #[instrument(skip(self, store), fields(datasource = %self.filename()))]
    pub async fn ensure_persisted(&self, store: &dyn TimeSeriesStore) -> StorageResult<()> {
        debug!("checking files for datasource {}", self.name);

        let series_file = self.series_file();
        if !store.exists(&series_file).await? {
            info!("creating series file for datasource {}", self.name);
            store.create(&series_file, &self.layout()).await?;
        }

        let metadata_file = self.metadata_file();
        if !tokio::fs::try_exists(&metadata_file).await? {
            info!("creating metadata file for datasource {}", self.name);
            let content = serde_json::to_string_pretty(&self.metadata()).map_err(io::Error::other)?;
            tokio::fs::write(&metadata_file, content).await?;
        }

        Ok(())
    }

    /// Persist a new value at the current time
    pub async fn update(&self, store: &dyn TimeSeriesStore, value: &SampleValue) -> StorageResult<()> {
        debug!("updating datasource {} = {value}", self.name);
        self.ensure_persisted(store).await?;
        store.update(&self.series_file(), value).await
    }
}
