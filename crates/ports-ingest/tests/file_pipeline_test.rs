//! End-to-end tests for the file pipeline

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ports_common::types::Port;
use ports_common::{PortsError, Result};
use ports_ingest::repository::Repository;
use ports_ingest::source::FileSource;
use ports_ingest::store::{MemoryStore, Store};
use ports_ingest::{Pipeline, PipelineOutcome};
use tempfile::NamedTempFile;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const LIVENESS: Duration = Duration::from_secs(5);

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("ports.json")
}

fn document(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write temp file");
    file
}

async fn ingest(
    path: impl Into<PathBuf>,
    capacity: usize,
) -> (Result<ports_ingest::PipelineReport>, Arc<MemoryStore<Port>>) {
    let store = Arc::new(MemoryStore::<Port>::new());
    let result = Pipeline::new(FileSource::<Port>::new(path), Repository::new(store.clone()))
        .buffer_capacity(capacity)
        .run(CancellationToken::new())
        .await;
    (result, store)
}

#[tokio::test]
async fn test_single_port_with_buffer_of_one() {
    let file = document(concat!(
        r#"{"AEAJM":{"name":"Ajman","city":"Ajman","country":"United Arab Emirates","#,
        r#""coordinates":[55.5136,25.4052]}}"#,
    ));

    let (result, store) = ingest(file.path(), 1).await;
    let report = result.unwrap();

    assert_eq!(report.outcome, PipelineOutcome::Completed);
    assert_eq!(report.stored, 1);
    assert_eq!(store.len().await, 1);

    let ajman = store.get("AEAJM").await.unwrap();
    assert_eq!(ajman.key, "AEAJM");
    assert_eq!(ajman.name, "Ajman");
    assert_eq!(ajman.coordinates, vec![55.5136, 25.4052]);
}

#[tokio::test]
async fn test_every_member_key_becomes_an_entry() {
    let (result, store) = ingest(fixture_path(), 2).await;
    let report = result.unwrap();

    assert_eq!(report.stored, 5);
    assert_eq!(store.len().await, 5);

    for key in ["AEAJM", "AEAUH", "AEDXB", "AEFJR", "AEJEA"] {
        let port = store.get(key).await.unwrap_or_else(|| panic!("missing {key}"));
        assert_eq!(port.key, key);
    }

    // The member key wins over an identifier embedded in the body.
    assert!(store.get("EMBEDDED").await.is_none());
    assert_eq!(store.get("AEJEA").await.unwrap().name, "Jebel Ali");
}

#[tokio::test]
async fn test_large_document_through_small_buffer() {
    let body: Vec<String> = (0..2_000)
        .map(|i| format!(r#""P{i:05}": {{"name": "Port {i}", "coordinates": [{i}.0, 1.5]}}"#))
        .collect();
    let file = document(&format!("{{{}}}", body.join(",")));

    let (result, store) = ingest(file.path(), 3).await;

    assert_eq!(result.unwrap().stored, 2_000);
    assert_eq!(store.len().await, 2_000);
    assert_eq!(store.get("P01234").await.unwrap().name, "Port 1234");
}

#[tokio::test]
async fn test_duplicate_keys_keep_the_last_record() {
    let file = document(r#"{"AEAJM": {"name": "first"}, "AEAJM": {"name": "second"}}"#);

    let (result, store) = ingest(file.path(), 4).await;

    assert_eq!(result.unwrap().stored, 2);
    assert_eq!(store.len().await, 1);
    assert_eq!(store.get("AEAJM").await.unwrap().name, "second");
}

#[tokio::test]
async fn test_truncated_document_fails_after_storing_prefix() {
    let file = document(
        r#"{"AEAJM": {"name": "Ajman"}, "AEAUH": {"name": "Abu Dhabi", "coordinates": [54.37,"#,
    );

    let (result, store) = timeout(LIVENESS, ingest(file.path(), 1)).await.unwrap();

    let err = result.unwrap_err();
    assert!(err.is_truncation(), "unexpected error: {err}");
    assert_eq!(store.len().await, 1);
    assert!(store.get("AEAJM").await.is_some());
}

#[tokio::test]
async fn test_invalid_content_fails_without_storing() {
    let file = document("invalid json content");

    let (result, store) = timeout(LIVENESS, ingest(file.path(), 1)).await.unwrap();

    assert!(matches!(result, Err(PortsError::Decode { .. })));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_unreadable_path_is_a_setup_error() {
    let (result, store) = ingest("/definitely/not/a/ports.json", 1).await;

    assert!(matches!(result, Err(PortsError::Open { .. })));
    assert!(store.is_empty().await);
}

/// Holds every write until released; later writes pass straight through.
struct GatedStore {
    inner: MemoryStore<Port>,
    entered: Notify,
    release: CancellationToken,
}

#[async_trait]
impl Store<Port> for GatedStore {
    async fn set(&self, key: &str, value: Port) -> Result<()> {
        self.entered.notify_one();
        self.release.cancelled().await;
        self.inner.set(key, value).await
    }
}

#[tokio::test]
async fn test_cancel_mid_run_reports_cancelled() {
    let store = Arc::new(GatedStore {
        inner: MemoryStore::new(),
        entered: Notify::new(),
        release: CancellationToken::new(),
    });
    let cancel = CancellationToken::new();

    let run = tokio::spawn(
        Pipeline::new(FileSource::<Port>::new(fixture_path()), Repository::new(store.clone()))
            .buffer_capacity(1)
            .run(cancel.clone()),
    );

    // First record is inside the store; cancel, then let it finish.
    timeout(LIVENESS, store.entered.notified()).await.unwrap();
    cancel.cancel();
    store.release.cancel();

    let report = timeout(LIVENESS, run).await.unwrap().unwrap().unwrap();

    // The record in the store plus at most one already buffered by the stream.
    assert_eq!(report.outcome, PipelineOutcome::Cancelled);
    assert!((1..=2).contains(&report.stored), "stored {}", report.stored);
    assert_eq!(store.inner.len().await as u64, report.stored);
}

struct RejectingStore;

#[async_trait]
impl Store<Port> for RejectingStore {
    async fn set(&self, _key: &str, _value: Port) -> Result<()> {
        Err(PortsError::Store("read-only".to_string()))
    }
}

#[tokio::test]
async fn test_store_failure_aborts_the_run() {
    let run = Pipeline::new(
        FileSource::<Port>::new(fixture_path()),
        Repository::new(RejectingStore),
    )
    .buffer_capacity(1)
    .run(CancellationToken::new());

    let err = timeout(LIVENESS, run).await.unwrap().unwrap_err();

    assert_eq!(err.to_string(), "Store error: can not set AEAJM: read-only");
}
