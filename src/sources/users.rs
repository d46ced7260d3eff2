//! Logged in users, counted from `who -q`

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use crate::datasource::{DatasourceKind, DatasourceOptions};
use crate::error::ConfigurationError;
use crate::plugin::{Plugin, Source};
use crate::sample::{Readings, SampleValue};

pub const NAME: &str = "users";

#[derive(Debug, Default)]
pub struct UsersSource;

/// Count logins and unique users in the first line of `who -q`
pub fn count_logins(output: &str) -> (usize, usize) {
    let names: Vec<&str> = output
        .lines()
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .collect();
    let unique: HashSet<&str> = names.iter().copied().collect();

    (names.len(), unique.len())
}

#[async_trait]
impl Source for UsersSource {
    fn name(&self) -> &str {
        NAME
    }

    fn update_interval(&self) -> u64 {
        120
    }

    async fn read_data(&mut self) -> anyhow::Result<Readings> {
        let output = Command::new("who")
            .arg("-q")
            .env("LC_ALL", "C")
            .output()
            .await
            .context("failed to run who")?;

        if !output.status.success() {
            bail!(
                "who exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("who -q: {stdout:?}");
        let (logins, users) = count_logins(&stdout);

        Ok(Readings::from([
            ("logins".to_string(), SampleValue::from(logins)),
            ("users".to_string(), SampleValue::from(users)),
        ]))
    }
}

pub fn configure(data_dir: &Path) -> Result<Plugin, ConfigurationError> {
    let mut plugin = Plugin::new(UsersSource, data_dir)?;

    plugin.add_datasource(
        "logins",
        DatasourceKind::Gauge,
        DatasourceOptions::new()
            .min(0.0)
            .title("Logins")
            .description("Number of logged in users."),
    )?;
    plugin.add_datasource(
        "users",
        DatasourceKind::Gauge,
        DatasourceOptions::new()
            .min(0.0)
            .title("Users")
            .description("Number of unique logged in users."),
    )?;

    Ok(plugin)
}
