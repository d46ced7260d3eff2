use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, trace, warn};

use crate::error::ConfigurationError;
use crate::limits::{DEFAULT_UNKNOWN_SKIP, LimitChecker};
use crate::plugin::Plugin;
use crate::sources::df::DfOptions;
use crate::sources::{self, Overrides};
use crate::store::{RrdTool, TimeSeriesStore};

/// Round-robin store configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StoreConfig {
    /// rrdtool compatible binary
    #[serde(default = "crate::util::get_default_rrdtool")]
    pub binary: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            binary: crate::util::get_default_rrdtool(),
        }
    }
}

/// Limit monitor configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LimitsConfig {
    /// Seconds between two checks of all datasources
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Trailing unknown samples ignored when looking for the last value
    #[serde(default = "default_unknown_skip")]
    pub unknown_skip: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            unknown_skip: default_unknown_skip(),
        }
    }
}

fn default_check_interval() -> u64 {
    300
}

fn default_unknown_skip() -> usize {
    DEFAULT_UNKNOWN_SKIP
}

fn default_load_windows() -> Vec<String> {
    sources::loadavg::DEFAULT_WINDOWS.map(String::from).to_vec()
}

/// One bundled plugin, selected by `type`
///
/// `datasources` maps datasource names to options overriding the plugin's
/// defaults (limits, titles, archives, ...).
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PluginConfig {
    Loadavg {
        #[serde(default = "default_load_windows")]
        intervals: Vec<String>,
        #[serde(default)]
        datasources: Overrides,
    },
    Memory {
        #[serde(default)]
        datasources: Overrides,
    },
    Users {
        #[serde(default)]
        datasources: Overrides,
    },
    Df {
        #[serde(default)]
        used_space: bool,
        #[serde(default)]
        percentage: bool,
        mount_points: Option<Vec<String>>,
        #[serde(default)]
        datasources: Overrides,
    },
    Net {
        #[serde(default)]
        datasources: Overrides,
    },
    Cpu {
        #[serde(default)]
        datasources: Overrides,
    },
    Temperature {
        #[serde(default)]
        datasources: Overrides,
    },
}

impl PluginConfig {
    /// Every bundled plugin with its default options
    pub fn all() -> Vec<PluginConfig> {
        vec![
            PluginConfig::Loadavg {
                intervals: default_load_windows(),
                datasources: Overrides::new(),
            },
            PluginConfig::Memory {
                datasources: Overrides::new(),
            },
            PluginConfig::Users {
                datasources: Overrides::new(),
            },
            PluginConfig::Df {
                used_space: false,
                percentage: false,
                mount_points: None,
                datasources: Overrides::new(),
            },
            PluginConfig::Net {
                datasources: Overrides::new(),
            },
            PluginConfig::Cpu {
                datasources: Overrides::new(),
            },
            PluginConfig::Temperature {
                datasources: Overrides::new(),
            },
        ]
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PluginConfig::Loadavg { .. } => "loadavg",
            PluginConfig::Memory { .. } => "memory",
            PluginConfig::Users { .. } => "users",
            PluginConfig::Df { .. } => "df",
            PluginConfig::Net { .. } => "net",
            PluginConfig::Cpu { .. } => "cpu",
            PluginConfig::Temperature { .. } => "temperature",
        }
    }

    pub fn overrides(&self) -> &Overrides {
        match self {
            PluginConfig::Loadavg { datasources, .. }
            | PluginConfig::Memory { datasources }
            | PluginConfig::Users { datasources }
            | PluginConfig::Df { datasources, .. }
            | PluginConfig::Net { datasources }
            | PluginConfig::Cpu { datasources }
            | PluginConfig::Temperature { datasources } => datasources,
        }
    }

    /// Configure the plugin from the current state of the machine, then
    /// apply the configured datasource options
    pub fn build(&self, data_dir: &Path) -> Result<Plugin, ConfigurationError> {
        let mut plugin = match self {
            PluginConfig::Loadavg { intervals, .. } => {
                sources::loadavg::configure(intervals.as_slice(), data_dir)
            }
            PluginConfig::Memory { .. } => sources::memory::configure(data_dir),
            PluginConfig::Users { .. } => sources::users::configure(data_dir),
            PluginConfig::Df {
                used_space,
                percentage,
                mount_points,
                ..
            } => {
                let options = DfOptions {
                    used_space: *used_space,
                    percentage: *percentage,
                    mount_points: mount_points.clone(),
                };
                sources::df::configure(options, data_dir)
            }
            PluginConfig::Net { .. } => sources::net::configure(data_dir),
            PluginConfig::Cpu { .. } => sources::cpu::configure(data_dir),
            PluginConfig::Temperature { .. } => sources::temperature::configure(data_dir),
        }?;

        let mut overrides: Vec<_> = self.overrides().iter().collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));

        for (name, options) in overrides {
            match plugin.configure_datasource(name, options.clone()) {
                Ok(()) => {}
                Err(ConfigurationError::DatasourceNotFound(_)) => warn!(
                    "plugin {} has no datasource {name:?}, ignoring its options",
                    plugin.name()
                ),
                Err(e) => return Err(e),
            }
        }

        Ok(plugin)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default = "crate::util::get_default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "crate::util::get_default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    /// Plugins to run (all bundled plugins when absent)
    pub plugins: Option<Vec<PluginConfig>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: crate::util::get_default_data_dir(),
            state_dir: crate::util::get_default_state_dir(),
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
            plugins: None,
        }
    }
}

impl Config {
    pub fn plugin_configs(&self) -> Vec<PluginConfig> {
        self.plugins.clone().unwrap_or_else(PluginConfig::all)
    }

    /// Build every configured plugin; a plugin failing to configure is
    /// logged and left out
    pub fn build_plugins(&self) -> Vec<Plugin> {
        self.plugin_configs()
            .iter()
            .filter_map(|config| match config.build(&self.data_dir) {
                Ok(plugin) => Some(plugin),
                Err(e) => {
                    error!("could not configure plugin {}: {e}", config.kind());
                    None
                }
            })
            .collect()
    }

    pub fn store(&self) -> RrdTool {
        RrdTool::new(&self.store.binary)
    }

    pub fn limit_checker(&self, store: Arc<dyn TimeSeriesStore>) -> LimitChecker {
        LimitChecker::new(&self.data_dir, &self.state_dir, store)
            .with_unknown_skip(self.limits.unknown_skip)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.limits.check_interval.max(1))
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read configuration file {path}"))?;
    serde_json::from_str(&file_content)
        .context("invalid configuration file provided")
        .inspect(|config| trace!("loaded config: {config:?}"))
}
