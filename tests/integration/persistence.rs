//! Series and sidecar persistence
//!
//! The command adapter is exercised with a small shell script standing in
//! for the rrdtool binary, which records its arguments. Only one test
//! installs the script so no other thread forks while it is being written.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use sensor_monitoring::{
    Datasource, DatasourceKind, DatasourceOptions, SampleValue,
    archive::ConsolidationFunction,
    store::{MemoryStore, RrdTool, StorageError, TimeSeriesStore},
};

use crate::helpers::*;

const FAKE_RRDTOOL: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
case "$2" in
    *fail.rrd)
        echo "ERROR: boom" >&2
        exit 1
        ;;
esac
if [ "$1" = fetch ]; then
    printf '                 raw\n\n1350000000: 1.0000000000e+00\n1350000300: -nan\n'
fi
"#;

fn install_fake_rrdtool(dir: &Path) -> PathBuf {
    let path = dir.join("rrdtool");
    std::fs::write(&path, FAKE_RRDTOOL).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_sidecar_format() {
    let dirs = create_test_dirs();
    let store = MemoryStore::new();
    let ds = create_persisted_datasource(
        &store,
        dirs.data.path(),
        "5min",
        DatasourceOptions::new()
            .title("5min load")
            .warning("0:4")
            .critical(":8"),
    )
    .await;

    let content = std::fs::read_to_string(ds.metadata_file()).unwrap();
    assert!(content.starts_with("{\n  \"update_interval\": 300"));

    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "update_interval": 300,
            "title": "5min load",
            "description": "",
            "limits": {
                "warning": { "min": 0.0, "max": 4.0 },
                "critical": { "max": 8.0 }
            }
        })
    );
}

#[tokio::test]
async fn test_files_are_never_recreated() {
    let dirs = create_test_dirs();
    let store = MemoryStore::new();
    let ds = Datasource::new(
        "test",
        300,
        dirs.data.path(),
        "value",
        DatasourceKind::Gauge,
        DatasourceOptions::new(),
    )
    .unwrap();

    for value in 0..3 {
        ds.update(&store, &SampleValue::Integer(value)).await.unwrap();
    }
    assert_eq!(store.creations(), 1);

    // a deleted sidecar is written again, the series is left alone
    std::fs::remove_file(ds.metadata_file()).unwrap();
    ds.ensure_persisted(&store).await.unwrap();
    assert!(ds.metadata_file().exists());
    assert_eq!(store.creations(), 1);
}

#[tokio::test]
async fn test_rrdtool_commands() {
    let dirs = create_test_dirs();
    let bin = tempfile::tempdir().unwrap();
    let store = RrdTool::new(install_fake_rrdtool(bin.path()));

    let ds = Datasource::new(
        "loadavg",
        300,
        dirs.data.path(),
        "5min",
        DatasourceKind::Gauge,
        DatasourceOptions::new().min(0.0).unknown(0.0),
    )
    .unwrap();

    ds.update(&store, &SampleValue::Float(0.25)).await.unwrap();

    let calls = calls(bin.path());
    assert_eq!(calls.len(), 2);

    let series = ds.series_file().display().to_string();
    let create = &calls[0];
    assert!(create.starts_with(&format!("create {series} --no-overwrite --step 300 ")));
    assert!(create.contains(" DS:raw:GAUGE:750:0:U "));
    assert!(create.contains(" DS:clean:COMPUTE:raw,UN,0.0,raw,IF "));
    assert!(create.contains(" RRA:AVERAGE:9999990e-07:1:576 "));
    assert!(create.ends_with(" RRA:MAX:9999990e-07:288:730"));
    assert_eq!(calls[1], format!("update {series} N:0.25"));

    let rows = store
        .fetch(Path::new("/data/x.rrd"), ConsolidationFunction::Average)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[&1_350_000_000], vec![1.0]);
    assert!(rows[&1_350_000_300][0].is_nan());

    let err = store
        .update(Path::new("/data/fail.rrd"), &SampleValue::Unknown)
        .await
        .unwrap_err();
    assert_matches!(err, StorageError::CommandFailed { code: Some(1), output, .. } if output.contains("boom"));
}
