use std::fs;
use std::sync::Arc;

use ingest_core::{ChunkProgress, JobId, PersistedSnapshot};
use ingest_engine::{FileStore, KeyValueStore, MemoryStore, SnapshotRepository, STATE_FILENAME};
use pretty_assertions::assert_eq;

fn snapshot() -> PersistedSnapshot {
    PersistedSnapshot {
        job_id: Some(JobId::from("job-42")),
        progress: "Processing chunk 3/10".to_string(),
        chunks: ChunkProgress::new(3, 10).unwrap(),
        uploading_started: true,
    }
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    SnapshotRepository::new(store.clone())
        .save(&snapshot())
        .unwrap();
    assert!(store.path().exists());

    let reopened = Arc::new(FileStore::open(dir.path()).unwrap());
    let loaded = SnapshotRepository::new(reopened).load();

    assert_eq!(loaded, snapshot());
}

#[test]
fn missing_state_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("state").join("ingest");

    let store = FileStore::open(&nested).unwrap();
    store.set("progress", "hello").unwrap();

    assert!(nested.join(STATE_FILENAME).exists());
    assert_eq!(store.get("progress").as_deref(), Some("hello"));
}

#[test]
fn corrupt_state_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(STATE_FILENAME), "{ not ron").unwrap();

    let store = Arc::new(FileStore::open(dir.path()).unwrap());

    assert_eq!(store.get("job_id"), None);
    assert_eq!(
        SnapshotRepository::new(store).load(),
        PersistedSnapshot::default()
    );
}

#[test]
fn clear_removes_every_snapshot_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    store.set("theme", "dark").unwrap();
    let repository = SnapshotRepository::new(store.clone());
    repository.save(&snapshot()).unwrap();

    repository.clear().unwrap();

    let reopened = FileStore::open(dir.path()).unwrap();
    for key in ["job_id", "progress", "processed_chunks", "total_chunks", "uploading_started"] {
        assert_eq!(reopened.get(key), None, "{key} should be gone");
    }
    assert_eq!(reopened.get("theme").as_deref(), Some("dark"));
}

#[test]
fn saving_a_snapshot_without_job_removes_the_key() {
    let store = Arc::new(MemoryStore::new());
    let repository = SnapshotRepository::new(store.clone());
    repository.save(&snapshot()).unwrap();

    repository
        .save(&PersistedSnapshot {
            job_id: None,
            ..snapshot()
        })
        .unwrap();

    assert_eq!(store.get("job_id"), None);
    assert_eq!(store.get("processed_chunks").as_deref(), Some("3"));
    assert!(!repository.load().is_resumable());
}

#[test]
fn unparsable_counts_fall_back_to_defaults() {
    let store = Arc::new(MemoryStore::new());
    store.set("job_id", "job-1").unwrap();
    store.set("processed_chunks", "many").unwrap();
    store.set("total_chunks", "-3").unwrap();
    store.set("uploading_started", "TRUE").unwrap();

    let loaded = SnapshotRepository::new(store).load();

    assert_eq!(loaded.chunks, ChunkProgress::default());
    assert!(loaded.is_resumable());
}
