//! `rrdtool` command adapter
//!
//! Every operation spawns the `rrdtool` binary. A non-zero exit code turns
//! into [`StorageError::CommandFailed`] carrying the captured output, which is
//! also logged at error level.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use super::backend::{FetchedRows, SeriesLayout, TimeSeriesStore};
use super::error::{StorageError, StorageResult};
use crate::archive::ConsolidationFunction;
use crate::sample::SampleValue;

/// Store backed by the `rrdtool` command line tool
#[derive(Debug, Clone)]
pub struct RrdTool {
    binary: PathBuf,
}

impl RrdTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run `rrdtool <command> <args...>` and return its standard output
    #[instrument(skip(self, args))]
    async fn call(&self, command: &str, args: Vec<OsString>) -> StorageResult<String> {
        debug!(
            "calling rrdtool {command} {}",
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.binary)
            .arg(command)
            .args(&args)
            // prevent localized number formatting in the output
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|source| StorageError::Spawn {
                command: format!("{} {command}", self.binary.display()),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            let text = format!("{stdout}{}", String::from_utf8_lossy(&output.stderr));
            error!("rrdtool returned non-zero exit code with output:\n{text}");
            return Err(StorageError::CommandFailed {
                command: format!("{} {command}", self.binary.display()),
                code: output.status.code(),
                output: text,
            });
        }

        Ok(stdout)
    }
}

impl Default for RrdTool {
    fn default() -> Self {
        Self::new("rrdtool")
    }
}

#[async_trait]
impl TimeSeriesStore for RrdTool {
    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn create(&self, path: &Path, layout: &SeriesLayout) -> StorageResult<()> {
        let mut args: Vec<OsString> = vec![
            path.into(),
            "--no-overwrite".into(),
            "--step".into(),
            layout.step.to_string().into(),
        ];
        args.extend(layout.signals.iter().map(|signal| signal.to_string().into()));
        args.extend(layout.archives.iter().map(OsString::from));

        self.call("create", args).await.map(|_| ())
    }

    async fn update(&self, path: &Path, value: &SampleValue) -> StorageResult<()> {
        let args: Vec<OsString> = vec![path.into(), format!("N:{value}").into()];
        self.call("update", args).await.map(|_| ())
    }

    async fn fetch(&self, path: &Path, cf: ConsolidationFunction) -> StorageResult<FetchedRows> {
        let args: Vec<OsString> = vec![path.into(), cf.as_str().into()];
        let output = self.call("fetch", args).await?;
        parse_fetch_output(&output)
    }
}

/// Parse the textual output of `rrdtool fetch`.
///
/// ```text
///                       raw             clean
///
/// 1350000000: 1.5000000000e+00 1.5000000000e+00
/// 1350000300: -nan 0.0000000000e+00
/// ```
pub fn parse_fetch_output(output: &str) -> StorageResult<FetchedRows> {
    let mut rows = FetchedRows::new();

    for line in output.lines().skip(2) {
        let mut fields = line.split_whitespace();
        let Some(timestamp) = fields.next() else {
            break;
        };
        let values: Vec<&str> = fields.collect();
        if values.is_empty() {
            break;
        }

        let timestamp = timestamp
            .trim_end_matches(':')
            .parse::<i64>()
            .map_err(|_| StorageError::InvalidOutput(format!("invalid timestamp in {line:?}")))?;

        let values = values
            .into_iter()
            .map(parse_value)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| StorageError::InvalidOutput(format!("invalid value in {line:?}")))?;

        rows.insert(timestamp, values);
    }

    Ok(rows)
}

fn parse_value(value: &str) -> Option<f64> {
    if value.to_ascii_lowercase().ends_with("nan") {
        return Some(f64::NAN);
    }
    value.parse().ok()
}
