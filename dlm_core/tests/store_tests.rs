use std::collections::HashMap;
use std::path::PathBuf;

use tempfile::TempDir;

use dlm_core::{StateStore, TransferState, TransferStatus};

fn sample_state(id: &str, status: TransferStatus) -> TransferState {
    let mut state = TransferState::new(
        id,
        "http://example.com/file.bin",
        "file.bin",
        PathBuf::from("downloads/file.bin"),
    );
    state.status = status;
    state
}

#[tokio::test]
async fn load_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("downloads.json"));

    assert!(store.load().await.is_empty());
}

#[tokio::test]
async fn save_then_load_preserves_terminal_records() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("downloads.json"));

    let mut state = sample_state("t1", TransferStatus::Completed);
    state.update_progress(2048, 2048);
    state.progress_percent = 100.0;

    let mut snapshot = HashMap::new();
    snapshot.insert("t1".to_string(), state);
    store.save(&snapshot).await.unwrap();

    let loaded = store.load().await;
    assert_eq!(loaded.len(), 1);
    let restored = &loaded["t1"];
    assert_eq!(restored.status, TransferStatus::Completed);
    assert_eq!(restored.downloaded_bytes, 2048);
    assert_eq!(restored.total_bytes, 2048);
    assert_eq!(restored.filename, "file.bin");
}

#[tokio::test]
async fn active_records_load_as_stopped() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("downloads.json"));

    let mut downloading = sample_state("t1", TransferStatus::Downloading);
    downloading.update_progress(400, 1000);
    let paused = sample_state("t2", TransferStatus::Paused);
    let completed = sample_state("t3", TransferStatus::Completed);

    let mut snapshot = HashMap::new();
    snapshot.insert("t1".to_string(), downloading);
    snapshot.insert("t2".to_string(), paused);
    snapshot.insert("t3".to_string(), completed);
    store.save(&snapshot).await.unwrap();

    let loaded = store.load().await;
    // No worker survived the restart, so neither status may claim one.
    assert_eq!(loaded["t1"].status, TransferStatus::Stopped);
    assert_eq!(loaded["t2"].status, TransferStatus::Stopped);
    assert_eq!(loaded["t3"].status, TransferStatus::Completed);
    // Progress survives the rewrite so a restart can pick it up.
    assert_eq!(loaded["t1"].downloaded_bytes, 400);
}

#[tokio::test]
async fn corrupt_store_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("downloads.json");
    tokio::fs::write(&path, b"{ not json at all").await.unwrap();

    let store = StateStore::new(&path);
    assert!(store.load().await.is_empty());
}

#[tokio::test]
async fn save_replaces_previous_contents() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path().join("downloads.json"));

    let mut snapshot = HashMap::new();
    snapshot.insert(
        "t1".to_string(),
        sample_state("t1", TransferStatus::Completed),
    );
    snapshot.insert(
        "t2".to_string(),
        sample_state("t2", TransferStatus::Stopped),
    );
    store.save(&snapshot).await.unwrap();

    snapshot.remove("t2");
    store.save(&snapshot).await.unwrap();

    let loaded = store.load().await;
    assert_eq!(loaded.len(), 1);
    assert!(loaded.contains_key("t1"));
}
