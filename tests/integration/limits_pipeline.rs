//! Limit checking over persisted datasources
//!
//! Covers state transitions, the unknown skip window, corrupted state files
//! and batch checks over the data directory.

use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use sensor_monitoring::{
    DatasourceOptions, ThresholdState, error::LimitError, store::MemoryStore,
};

use crate::helpers::*;

fn limited() -> DatasourceOptions {
    DatasourceOptions::new().warning("0:10").critical("0:20")
}

#[tokio::test]
async fn test_transitions_are_persisted_only_on_change() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    let ds = create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;

    // absent state file counts as NORMAL, nothing to write
    push_values(&store, &ds, &[5.0]).await;
    let transition = checker.check("test.cpu").await.unwrap();
    assert_eq!(transition.previous, ThresholdState::Normal);
    assert_eq!(transition.current, ThresholdState::Normal);
    assert_eq!(transition.value, 5.0);
    assert_eq!(read_state(&dirs, "test.cpu"), None);

    push_values(&store, &ds, &[15.0]).await;
    let transition = checker.check("test.cpu").await.unwrap();
    assert!(transition.is_change());
    assert_eq!(transition.current, ThresholdState::Warning);
    assert_eq!(read_state(&dirs, "test.cpu").as_deref(), Some("WARNING"));

    let state_file = checker.state_file("test.cpu");
    let modified = std::fs::metadata(&state_file).unwrap().modified().unwrap();

    push_values(&store, &ds, &[16.0]).await;
    let transition = checker.check("test.cpu").await.unwrap();
    assert!(!transition.is_change());
    assert_eq!(
        std::fs::metadata(&state_file).unwrap().modified().unwrap(),
        modified
    );

    push_values(&store, &ds, &[25.0]).await;
    assert_eq!(
        checker.check("test.cpu").await.unwrap().current,
        ThresholdState::Critical
    );

    push_values(&store, &ds, &[-1.0]).await;
    assert_eq!(
        checker.check("test.cpu").await.unwrap().current,
        ThresholdState::Critical
    );

    push_values(&store, &ds, &[3.0]).await;
    let transition = checker.check("test.cpu").await.unwrap();
    assert_eq!(transition.previous, ThresholdState::Critical);
    assert_eq!(transition.current, ThresholdState::Normal);
    assert_eq!(read_state(&dirs, "test.cpu").as_deref(), Some("NORMAL"));
}

#[tokio::test]
async fn test_trailing_unknowns_within_window_are_skipped() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    let ds = create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;

    push_values(&store, &ds, &[7.0, f64::NAN, f64::NAN]).await;
    let transition = checker.check("test.cpu").await.unwrap();
    assert_eq!(transition.value, 7.0);
    assert_eq!(transition.current, ThresholdState::Normal);

    // four trailing unknowns exceed the default window of three
    push_values(&store, &ds, &[f64::NAN, f64::NAN]).await;
    let transition = checker.check("test.cpu").await.unwrap();
    assert!(transition.value.is_nan());
    assert_eq!(transition.current, ThresholdState::Unknown);
    assert_eq!(read_state(&dirs, "test.cpu").as_deref(), Some("UNKNOWN"));
}

#[tokio::test]
async fn test_skip_window_is_configurable() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone()).with_unknown_skip(0);
    let ds = create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;

    push_values(&store, &ds, &[7.0, f64::NAN]).await;
    assert_eq!(
        checker.check("test.cpu").await.unwrap().current,
        ThresholdState::Unknown
    );
}

#[tokio::test]
async fn test_empty_series_is_unknown() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;

    assert_eq!(
        checker.check("test.cpu").await.unwrap().current,
        ThresholdState::Unknown
    );
}

#[tokio::test]
async fn test_clean_signal_is_evaluated() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    let ds = create_persisted_datasource(
        &store,
        dirs.data.path(),
        "errors",
        DatasourceOptions::new().unknown(0.0).warning(":10"),
    )
    .await;

    // raw unknown, clean substituted
    push_rows(&store, &ds, &[vec![f64::NAN, 0.0]]).await;
    let transition = checker.check("test.errors").await.unwrap();
    assert_eq!(transition.value, 0.0);
    assert_eq!(transition.current, ThresholdState::Normal);
}

#[tokio::test]
async fn test_corrupted_state_degrades_to_unknown() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    let ds = create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;
    push_values(&store, &ds, &[5.0]).await;

    std::fs::write(checker.state_file("test.cpu"), "BROKEN").unwrap();

    let transition = checker.check("test.cpu").await.unwrap();
    assert_eq!(transition.previous, ThresholdState::Unknown);
    assert_eq!(transition.current, ThresholdState::Normal);
    assert_eq!(read_state(&dirs, "test.cpu").as_deref(), Some("NORMAL"));
}

#[tokio::test]
async fn test_corrupted_state_is_replaced_when_still_unknown() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    let ds = create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;
    push_values(&store, &ds, &[f64::NAN; 5]).await;

    std::fs::write(checker.state_file("test.cpu"), "garbage\n").unwrap();

    let transition = checker.check("test.cpu").await.unwrap();
    assert!(!transition.is_change());
    assert_eq!(transition.current, ThresholdState::Unknown);
    assert_eq!(read_state(&dirs, "test.cpu").as_deref(), Some("UNKNOWN"));

    // a valid token now, later checks leave the file alone
    let state_file = checker.state_file("test.cpu");
    let modified = std::fs::metadata(&state_file).unwrap().modified().unwrap();
    checker.check("test.cpu").await.unwrap();
    assert_eq!(
        std::fs::metadata(&state_file).unwrap().modified().unwrap(),
        modified
    );
}

#[tokio::test]
async fn test_legacy_state_token_is_understood() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    let ds = create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;
    push_values(&store, &ds, &[15.0]).await;

    std::fs::write(checker.state_file("test.cpu"), "WARN").unwrap();

    let transition = checker.check("test.cpu").await.unwrap();
    assert!(!transition.is_change());
    // unchanged, so not rewritten with the full token
    assert_eq!(read_state(&dirs, "test.cpu").as_deref(), Some("WARN"));
}

#[tokio::test]
async fn test_datasource_without_limits() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());
    create_persisted_datasource(&store, dirs.data.path(), "cpu", DatasourceOptions::new()).await;

    assert_matches!(
        checker.check("test.cpu").await,
        Err(LimitError::NoLimitsConfigured(name)) if name == "test.cpu"
    );
}

#[tokio::test]
async fn test_missing_metadata() {
    let dirs = create_test_dirs();
    let checker = create_checker(&dirs, Arc::new(MemoryStore::new()));

    assert_matches!(
        checker.check("test.nothing").await,
        Err(LimitError::MetadataIo { .. })
    );
}

#[tokio::test]
async fn test_check_all_reports_only_changes() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());

    let stable = create_persisted_datasource(&store, dirs.data.path(), "stable", limited()).await;
    let hot = create_persisted_datasource(&store, dirs.data.path(), "hot", limited()).await;
    let free = create_persisted_datasource(
        &store,
        dirs.data.path(),
        "free",
        DatasourceOptions::new(),
    )
    .await;

    push_values(&store, &stable, &[1.0]).await;
    push_values(&store, &hot, &[50.0]).await;
    push_values(&store, &free, &[1000.0]).await;

    std::fs::write(checker.state_file("test.hot"), "WARNING").unwrap();

    let transitions = checker.check_all().await;
    assert_eq!(transitions.keys().collect::<Vec<_>>(), vec!["test.hot"]);
    assert_eq!(transitions["test.hot"].previous, ThresholdState::Warning);
    assert_eq!(transitions["test.hot"].current, ThresholdState::Critical);
    assert_eq!(read_state(&dirs, "test.hot").as_deref(), Some("CRITICAL"));

    // a second pass sees no changes
    assert!(checker.check_all().await.is_empty());
}

#[tokio::test]
async fn test_check_all_skips_broken_datasources() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = create_checker(&dirs, store.clone());

    let hot = create_persisted_datasource(&store, dirs.data.path(), "hot", limited()).await;
    push_values(&store, &hot, &[50.0]).await;

    std::fs::write(dirs.data.path().join("test.garbage.json"), "{").unwrap();
    // sidecar without a series
    std::fs::copy(
        hot.metadata_file(),
        dirs.data.path().join("test.orphan.json"),
    )
    .unwrap();

    let transitions = checker.check_all().await;
    assert_eq!(transitions.len(), 1);
    assert!(transitions.contains_key("test.hot"));
}

#[tokio::test]
async fn test_concurrent_checks_of_one_datasource_are_serialized() {
    let dirs = create_test_dirs();
    let store = Arc::new(MemoryStore::new());
    let checker = Arc::new(create_checker(&dirs, store.clone()));
    let ds = create_persisted_datasource(&store, dirs.data.path(), "cpu", limited()).await;
    push_values(&store, &ds, &[15.0]).await;

    let checks = (0..8).map(|_| {
        let checker = checker.clone();
        tokio::spawn(async move { checker.check("test.cpu").await.unwrap() })
    });
    let transitions: Vec<_> = join_all(checks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(transitions.iter().filter(|t| t.is_change()).count(), 1);
    assert!(
        transitions
            .iter()
            .all(|t| t.current == ThresholdState::Warning)
    );
}
