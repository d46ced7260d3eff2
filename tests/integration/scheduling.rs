//! Scheduler end-to-end tests
//!
//! Plugins run against the in-memory store while the limit monitor reads
//! the same store and data directory.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sensor_monitoring::{
    DatasourceKind, DatasourceOptions, Plugin, SampleValue, Scheduler, ThresholdState,
    actors::PluginState, store::MemoryStore,
};

use crate::helpers::*;

fn plugin_with(source: ScriptedSource, data_dir: &std::path::Path, names: &[&str]) -> Plugin {
    let mut plugin = Plugin::new(source, data_dir).unwrap();
    for name in names {
        plugin
            .add_datasource(
                name,
                DatasourceKind::Gauge,
                DatasourceOptions::new().critical(":10"),
            )
            .unwrap();
    }
    plugin
}

#[tokio::test]
async fn test_poll_feeds_the_limit_monitor() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = Scheduler::new(store.clone());

    let source = ScriptedSource::values("sensors", &[("temp", SampleValue::Float(42.5))]);
    let handle = scheduler.spawn(plugin_with(source, dirs.data.path(), &["temp"]));
    let monitor = scheduler.spawn_limit_monitor(
        Arc::new(create_checker(&dirs, store.clone())),
        Duration::from_secs(300),
    );

    let report = handle.poll_now().await.unwrap();
    assert_eq!(report.updated, vec!["temp".to_string()]);
    assert!(dirs.data.path().join("sensors.temp.json").exists());

    let transitions = monitor.check_now().await.unwrap();
    let transition = transitions["sensors.temp"];
    assert_eq!(transition.current, ThresholdState::Critical);
    assert_eq!(transition.value, 42.5);
    assert_eq!(read_state(&dirs, "sensors.temp").as_deref(), Some("CRITICAL"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_failing_plugin_does_not_affect_others() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = Scheduler::new(store.clone());

    let broken = scheduler.spawn(plugin_with(
        ScriptedSource::failing("broken"),
        dirs.data.path(),
        &["value"],
    ));
    let working = scheduler.spawn(plugin_with(
        ScriptedSource::values("working", &[("value", SampleValue::Integer(1))]),
        dirs.data.path(),
        &["value"],
    ));

    assert!(broken.poll_now().await.is_err());
    assert!(working.poll_now().await.is_ok());
    // the failed plugin keeps running and can be polled again
    assert!(broken.poll_now().await.is_err());

    assert_eq!(broken.state(), PluginState::Running);
    assert_eq!(store.updates(), 1);
    assert!(!dirs.data.path().join("broken.value.json").exists());

    scheduler.shutdown().await;
    assert_eq!(broken.state(), PluginState::Stopped);
    assert_eq!(working.state(), PluginState::Stopped);
}

#[tokio::test]
async fn test_store_failure_is_local_to_one_cycle() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = Scheduler::new(store.clone());

    let handle = scheduler.spawn(plugin_with(
        ScriptedSource::values("flaky", &[("value", SampleValue::Integer(3))]),
        dirs.data.path(),
        &["value"],
    ));

    store.fail_updates(true);
    let err = handle.poll_now().await.unwrap_err();
    assert!(format!("{err:#}").contains("injected failure"));

    store.fail_updates(false);
    let report = handle.poll_now().await.unwrap();
    assert_eq!(report.updated, vec!["value".to_string()]);
    // created once, by the first cycle
    assert_eq!(store.creations(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_recovering_source() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = Scheduler::new(store.clone());

    let source = ScriptedSource::new(
        "recovering",
        60,
        vec![
            Err("not ready".to_string()),
            Ok(readings(&[("value", SampleValue::Float(1.5))])),
        ],
    );
    let handle = scheduler.spawn(plugin_with(source, dirs.data.path(), &["value", "missing"]));

    assert!(handle.poll_now().await.is_err());

    let report = handle.poll_now().await.unwrap();
    assert_eq!(report.updated, vec!["value".to_string()]);
    assert_eq!(report.missing, vec!["missing".to_string()]);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_shared_by_every_task() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = Scheduler::new(store.clone());

    for name in ["a", "b", "c"] {
        scheduler.spawn(plugin_with(
            ScriptedSource::failing(name),
            dirs.data.path(),
            &[],
        ));
    }
    scheduler.spawn_limit_monitor(
        Arc::new(create_checker(&dirs, store.clone())),
        Duration::from_secs(60),
    );

    tokio::time::sleep(Duration::from_secs(1000)).await;

    let token = scheduler.cancellation_token();
    let handles = scheduler.sources().to_vec();
    assert!(handles.iter().all(|h| h.state() == PluginState::Running));

    token.cancel();
    scheduler.join().await;
    assert!(handles.iter().all(|h| h.state() == PluginState::Stopped));
}
