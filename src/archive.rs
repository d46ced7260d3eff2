//! Round-robin archive definitions
//!
//! An [`ArchiveGroup`] is a compact way of describing the retention of a
//! datasource: a list of consolidation functions combined with a list of
//! named retention templates. At series creation time the group is expanded
//! into one [`ArchiveSpec`] per (function, template) pair.
//!
//! ```text
//! cfs = [AVERAGE, MAX], templates = [day, week], step = 300
//!
//! RRA:AVERAGE:9999990e-07:1:576
//! RRA:AVERAGE:9999990e-07:6:672
//! RRA:MAX:9999990e-07:1:576
//! RRA:MAX:9999990e-07:6:672
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigurationError;

/// Minimum fraction of known primary points needed to consolidate a row
pub const XFF: f64 = 0.999999;

/// Aggregation applied when samples are compressed into a coarser archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsolidationFunction {
    Average,
    Min,
    Max,
    Last,
}

impl ConsolidationFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsolidationFunction::Average => "AVERAGE",
            ConsolidationFunction::Min => "MIN",
            ConsolidationFunction::Max => "MAX",
            ConsolidationFunction::Last => "LAST",
        }
    }
}

impl fmt::Display for ConsolidationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsolidationFunction {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVERAGE" => Ok(ConsolidationFunction::Average),
            "MIN" => Ok(ConsolidationFunction::Min),
            "MAX" => Ok(ConsolidationFunction::Max),
            "LAST" => Ok(ConsolidationFunction::Last),
            other => Err(ConfigurationError::InvalidConsolidationFunction(
                other.to_string(),
            )),
        }
    }
}

/// Named retention policy: target resolution and number of retained rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionTemplate {
    Day,
    Week,
    Month,
    Year,
}

impl RetentionTemplate {
    /// Resolution of one consolidated row in seconds
    pub fn resolution(&self) -> u64 {
        match self {
            RetentionTemplate::Day => 300,
            RetentionTemplate::Week => 1800,
            RetentionTemplate::Month => 7200,
            RetentionTemplate::Year => 86400,
        }
    }

    pub fn rows(&self) -> u64 {
        match self {
            RetentionTemplate::Day => 576,
            RetentionTemplate::Week => 672,
            RetentionTemplate::Month => 720,
            RetentionTemplate::Year => 730,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionTemplate::Day => "day",
            RetentionTemplate::Week => "week",
            RetentionTemplate::Month => "month",
            RetentionTemplate::Year => "year",
        }
    }
}

impl FromStr for RetentionTemplate {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(RetentionTemplate::Day),
            "week" => Ok(RetentionTemplate::Week),
            "month" => Ok(RetentionTemplate::Month),
            "year" => Ok(RetentionTemplate::Year),
            other => Err(ConfigurationError::UnknownTemplate(other.to_string())),
        }
    }
}

/// One low-level archive definition handed to the store on creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchiveSpec {
    pub consolidation: ConsolidationFunction,
    pub xff: f64,
    /// Number of primary data points consolidated into one row
    pub multiplier: u64,
    pub rows: u64,
}

impl fmt::Display for ArchiveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // rrdtool refuses most float notations for xff
        write!(
            f,
            "RRA:{}:{:.0}e-07:{}:{}",
            self.consolidation,
            self.xff * 1e7,
            self.multiplier,
            self.rows
        )
    }
}

/// Generator of archive specs from consolidation functions and templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveGroup {
    cfs: Vec<ConsolidationFunction>,
    templates: Vec<RetentionTemplate>,
}

impl ArchiveGroup {
    /// Build a group from textual names, rejecting unknown ones
    pub fn new<C, T>(cfs: &[C], templates: &[T]) -> Result<Self, ConfigurationError>
    where
        C: AsRef<str>,
        T: AsRef<str>,
    {
        let cfs = cfs
            .iter()
            .map(|cf| cf.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        let templates = templates
            .iter()
            .map(|template| template.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { cfs, templates })
    }

    /// Group with only the given consolidation functions and all templates
    pub fn with_cfs(cfs: Vec<ConsolidationFunction>) -> Self {
        Self {
            cfs,
            ..Self::default()
        }
    }

    /// Group with the default consolidation functions and the given templates
    pub fn with_templates(templates: Vec<RetentionTemplate>) -> Self {
        Self {
            templates,
            ..Self::default()
        }
    }

    pub fn cfs(&self) -> &[ConsolidationFunction] {
        &self.cfs
    }

    pub fn templates(&self) -> &[RetentionTemplate] {
        &self.templates
    }

    /// Expand the group for a datasource sampled every `step` seconds.
    ///
    /// Functions form the outer loop and templates the inner one, so the
    /// output is stable for identical inputs.
    pub fn generate(&self, step: u64) -> Vec<ArchiveSpec> {
        let mut specs = Vec::with_capacity(self.cfs.len() * self.templates.len());
        for cf in &self.cfs {
            for template in &self.templates {
                specs.push(ArchiveSpec {
                    consolidation: *cf,
                    xff: XFF,
                    multiplier: multiplier(template.resolution(), step),
                    rows: template.rows(),
                });
            }
        }
        specs
    }
}

impl Default for ArchiveGroup {
    fn default() -> Self {
        Self {
            cfs: vec![
                ConsolidationFunction::Average,
                ConsolidationFunction::Min,
                ConsolidationFunction::Max,
            ],
            templates: vec![
                RetentionTemplate::Day,
                RetentionTemplate::Week,
                RetentionTemplate::Month,
                RetentionTemplate::Year,
            ],
        }
    }
}

/// `round(resolution / step)` with ties to even, never below one primary
/// point per row
pub fn multiplier(resolution: u64, step: u64) -> u64 {
    let steps = (resolution as f64 / step as f64).round_ties_even() as u64;
    steps.max(1)
}

/// Archive entry of a datasource: a generated group or a literal definition
#[derive(Debug, Clone, PartialEq)]
pub enum Archive {
    Group(ArchiveGroup),
    Literal(String),
}

impl Archive {
    /// Render the archive into store definitions for the given step
    pub fn definitions(&self, step: u64) -> Vec<String> {
        match self {
            Archive::Group(group) => group
                .generate(step)
                .iter()
                .map(ToString::to_string)
                .collect(),
            Archive::Literal(definition) => vec![definition.clone()],
        }
    }
}

impl From<ArchiveGroup> for Archive {
    fn from(group: ArchiveGroup) -> Self {
        Archive::Group(group)
    }
}

/// Configuration form of [`Archive`]
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ArchiveConfig {
    Literal(String),
    Group {
        #[serde(default = "default_cfs")]
        cfs: Vec<String>,
        #[serde(default = "default_templates")]
        templates: Vec<String>,
    },
}

fn default_cfs() -> Vec<String> {
    ["AVERAGE", "MIN", "MAX"].map(String::from).to_vec()
}

fn default_templates() -> Vec<String> {
    ["day", "week", "month", "year"].map(String::from).to_vec()
}

impl<'de> Deserialize<'de> for Archive {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match ArchiveConfig::deserialize(deserializer)? {
            ArchiveConfig::Literal(definition) => Ok(Archive::Literal(definition)),
            ArchiveConfig::Group { cfs, templates } => ArchiveGroup::new(&cfs, &templates)
                .map(Archive::Group)
                .map_err(serde::de::Error::custom),
        }
    }
}
