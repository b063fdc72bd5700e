//! Behavioural tests for `RegistrySyncJob` against scripted page sources,
//! the in-memory store and (at the end) a wiremock-backed registry.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use onjn_core::SlotStatus;
use onjn_registry::{RawSlotRecord, RegistryClient, RegistryError, RegistryPage};
use onjn_sync::{
    JobKind, JobStatusStore, MemoryRecordStore, PageSource, RegistrySyncJob, SyncConfig,
    SyncError, SyncOutcome, SyncStatus,
};
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type PageFn = dyn Fn(u32) -> Result<RegistryPage, RegistryError> + Send + Sync;

/// Page source driven by a closure over the page number.
struct Scripted {
    pages: Box<PageFn>,
    calls: Arc<AtomicU32>,
}

impl Scripted {
    fn new(pages: impl Fn(u32) -> Result<RegistryPage, RegistryError> + Send + Sync + 'static) -> Self {
        Self {
            pages: Box::new(pages),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl PageSource for Scripted {
    async fn fetch_page(&self, page: u32, _per_page: u32) -> Result<RegistryPage, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.pages)(page)
    }
}

/// Page source that parks until released.
struct Blocked {
    release: Arc<Notify>,
}

impl PageSource for Blocked {
    async fn fetch_page(&self, _page: u32, _per_page: u32) -> Result<RegistryPage, RegistryError> {
        self.release.notified().await;
        Ok(RegistryPage::default())
    }
}

fn raw(serial: &str) -> RawSlotRecord {
    RawSlotRecord {
        serial_number: Some(serial.to_string()),
        equipment_type: Some("Mijloc de joc".to_string()),
        company_name: Some("Acme Gaming SRL".to_string()),
        brand_name: Some("Lucky Star".to_string()),
        county: Some("JUDEȚUL CLUJ".to_string()),
        city: Some("Cluj-Napoca".to_string()),
        slot_address: Some("Str. Horea nr. 3".to_string()),
        license_number: Some("L1-2024-0042".to_string()),
        authorization_date: Some("15.01.2024".to_string()),
        expiry_date: None,
        status: Some("Activ".to_string()),
    }
}

fn page(serials: &[&str], has_more: bool) -> RegistryPage {
    RegistryPage {
        records: serials
            .iter()
            .map(|s| serde_json::to_value(raw(s)).expect("serialize raw row"))
            .collect(),
        has_more,
        total_pages: None,
    }
}

fn outage() -> RegistryError {
    RegistryError::UnexpectedStatus {
        status: 502,
        url: "http://registry.test/api/slots".to_string(),
    }
}

fn config() -> SyncConfig {
    SyncConfig {
        page_size: 2,
        default_max_pages: 50,
        max_consecutive_failures: 3,
        inter_page_delay: Duration::ZERO,
        snapshot_path: PathBuf::from("/nonexistent/onjn_snapshot.json"),
        snapshot_chunk_size: 2,
    }
}

fn job<S: PageSource>(source: S, store: MemoryRecordStore) -> RegistrySyncJob<S, MemoryRecordStore> {
    RegistrySyncJob::new(source, store, JobStatusStore::new(), config())
}

/// Three pages: A,B / C,D / E.
fn three_pages(n: u32) -> Result<RegistryPage, RegistryError> {
    Ok(match n {
        1 => page(&["A", "B"], true),
        2 => page(&["C", "D"], true),
        _ => page(&["E"], false),
    })
}

fn temp_snapshot(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("onjn-sync-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).expect("write snapshot fixture");
    path
}

// ---------------------------------------------------------------------------
// Registry runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_run_inserts_every_row_and_completes() {
    let store = MemoryRecordStore::new();
    let sync = job(Scripted::new(three_pages), store.clone());

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.kind, Some(JobKind::Registry));
    assert_eq!(finished.current_page, 3);
    assert_eq!(finished.records_seen, 5);
    assert_eq!(finished.inserted, 5);
    assert_eq!(finished.updated, 0);
    assert_eq!(finished.errors, 0);
    assert!(finished.finished_at.is_some());
    assert_eq!(store.len().await, 5);
    assert_eq!(
        store.get("C").await.unwrap().status,
        SlotStatus::Active,
        "rows are normalized before they are stored"
    );
}

#[tokio::test]
async fn rerun_updates_instead_of_duplicating() {
    let store = MemoryRecordStore::new();
    let sync = job(Scripted::new(three_pages), store.clone());

    sync.start(None, "test").unwrap().await.unwrap();
    let second = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 5);
    assert_eq!(store.len().await, 5);
}

#[tokio::test]
async fn total_pages_from_the_registry_is_published() {
    let sync = job(
        Scripted::new(|_| {
            Ok(RegistryPage {
                total_pages: Some(1),
                ..page(&["A"], false)
            })
        }),
        MemoryRecordStore::new(),
    );
    let finished = sync.start(None, "test").unwrap().await.unwrap();
    assert_eq!(finished.total_pages, Some(1));
}

#[tokio::test]
async fn max_pages_stops_an_endless_registry() {
    let source = Scripted::new(|n| Ok(page(&[&format!("S{n}")], true)));
    let calls = Arc::clone(&source.calls);
    let sync = job(source, MemoryRecordStore::new());

    let finished = sync.start(Some(2), "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.current_page, 2);
    assert_eq!(finished.inserted, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(finished.current_step.contains("max_pages"));
}

#[tokio::test]
async fn single_page_failure_is_skipped() {
    let store = MemoryRecordStore::new();
    let sync = job(
        Scripted::new(|n| match n {
            2 => Err(outage()),
            other => three_pages(other),
        }),
        store.clone(),
    );

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.errors, 1);
    assert_eq!(finished.inserted, 3, "page 2 rows are missing");
    assert!(store.get("C").await.is_none());
    assert_eq!(
        sync.jobs().observe(chrono::Utc::now(), Duration::from_secs(900)).outcome,
        SyncOutcome::SucceededWithErrors
    );
}

#[tokio::test]
async fn consecutive_failures_fail_the_job() {
    let source = Scripted::new(|n| if n == 1 { three_pages(1) } else { Err(outage()) });
    let calls = Arc::clone(&source.calls);
    let sync = job(source, MemoryRecordStore::new());

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Failed);
    assert_eq!(finished.errors, 3);
    assert_eq!(finished.current_page, 4);
    assert_eq!(finished.inserted, 2, "rows before the outage are kept");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(finished.current_step.contains("502"));
}

#[tokio::test]
async fn a_success_resets_the_failure_streak() {
    // Fail, fail, succeed, fail, fail, last page: never three in a row.
    let sync = job(
        Scripted::new(|n| match n {
            2 | 3 | 5 | 6 => Err(outage()),
            7 => Ok(page(&["Z"], false)),
            other => Ok(page(&[&format!("S{other}")], true)),
        }),
        MemoryRecordStore::new(),
    );

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.errors, 4);
    assert_eq!(finished.inserted, 3);
}

#[tokio::test]
async fn invalid_rows_are_counted_and_skipped() {
    let store = MemoryRecordStore::new();
    let sync = job(
        Scripted::new(|_| {
            let mut p = page(&["A", "B", "C"], false);
            p.records[1]["status"] = serde_json::Value::Null;
            p.records[2]["status"] = serde_json::json!("necunoscut");
            Ok(p)
        }),
        store.clone(),
    );

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.records_seen, 3);
    assert_eq!(finished.inserted, 1);
    assert_eq!(finished.errors, 2);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn mistyped_row_does_not_sink_its_page() {
    let store = MemoryRecordStore::new();
    let sync = job(
        Scripted::new(|_| {
            let mut p = page(&["A", "B", "C"], false);
            p.records[1]["serial_number"] = serde_json::json!(7);
            Ok(p)
        }),
        store.clone(),
    );

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.records_seen, 3);
    assert_eq!(finished.inserted, 2);
    assert_eq!(finished.errors, 1);
    assert!(store.get("A").await.is_some());
    assert!(store.get("C").await.is_some());
}

#[tokio::test]
async fn mistyped_rows_on_every_page_never_fail_the_job() {
    // One bad row per page would have been three page failures in a row
    // if rows were decoded with their page.
    let sync = job(
        Scripted::new(|n| {
            let mut p = three_pages(n)?;
            p.records.push(serde_json::json!({ "serial_number": { "nested": true } }));
            Ok(p)
        }),
        MemoryRecordStore::new(),
    );

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.inserted, 5);
    assert_eq!(finished.errors, 3);
}

// ---------------------------------------------------------------------------
// Single flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_trigger_is_rejected_while_running() {
    let release = Arc::new(Notify::new());
    let sync = job(
        Blocked {
            release: Arc::clone(&release),
        },
        MemoryRecordStore::new(),
    );

    let handle = sync.start(None, "api").unwrap();
    assert_eq!(sync.jobs().get().status, SyncStatus::Running);

    let err = sync.start(None, "scheduler").unwrap_err();
    assert!(matches!(
        err,
        SyncError::AlreadyRunning {
            running: JobKind::Registry
        }
    ));
    assert!(sync.import_from_snapshot(None, "cli").is_err());
    assert_eq!(sync.jobs().get().trigger.as_deref(), Some("api"));

    release.notify_one();
    let finished = handle.await.unwrap();
    assert_eq!(finished.status, SyncStatus::Completed);
    assert!(sync.start(None, "scheduler").is_ok(), "slot is free again");
}

#[tokio::test]
async fn clones_share_the_single_flight_slot() {
    let release = Arc::new(Notify::new());
    let sync = job(
        Blocked {
            release: Arc::clone(&release),
        },
        MemoryRecordStore::new(),
    );
    let other = sync.clone();

    let handle = sync.start(None, "api").unwrap();
    assert!(other.start(None, "api").is_err());

    release.notify_one();
    handle.await.unwrap();
}

// ---------------------------------------------------------------------------
// Snapshot import
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_array_is_imported_in_chunks() {
    let rows: Vec<_> = ["A", "B", "C", "D", "E"].iter().map(|s| raw(s)).collect();
    let path = temp_snapshot("array.json", &serde_json::to_string(&rows).unwrap());
    let store = MemoryRecordStore::new();
    let sync = job(Scripted::new(|_| Err(outage())), store.clone());

    let finished = sync
        .import_from_snapshot(Some(path.clone()), "cli")
        .unwrap()
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.kind, Some(JobKind::Snapshot));
    assert_eq!(finished.total_pages, Some(3));
    assert_eq!(finished.current_page, 3);
    assert_eq!(finished.inserted, 5);
    assert_eq!(store.len().await, 5);
}

#[tokio::test]
async fn snapshot_json_lines_with_a_bad_row() {
    let contents = r#"{"serialNumber": "A", "companyName": "Acme", "status": "Activ"}

{"serialNumber": "B", "companyName": "Acme"}
"#;
    let path = temp_snapshot("lines.jsonl", contents);
    let sync = job(Scripted::new(|_| Err(outage())), MemoryRecordStore::new());

    let finished = sync
        .import_from_snapshot(Some(path.clone()), "cli")
        .unwrap()
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.records_seen, 2);
    assert_eq!(finished.inserted, 1);
    assert_eq!(finished.errors, 1);
}

#[tokio::test]
async fn snapshot_array_with_a_mistyped_row_imports_the_rest() {
    let mut rows: Vec<serde_json::Value> = ["A", "B"]
        .iter()
        .map(|s| serde_json::to_value(raw(s)).unwrap())
        .collect();
    rows.push(serde_json::json!({
        "serialNumber": 12345,
        "companyName": "Acme",
        "status": "Activ"
    }));
    let path = temp_snapshot("mistyped.json", &serde_json::to_string(&rows).unwrap());
    let store = MemoryRecordStore::new();
    let sync = job(Scripted::new(|_| Err(outage())), store.clone());

    let finished = sync
        .import_from_snapshot(Some(path.clone()), "cli")
        .unwrap()
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.records_seen, 3);
    assert_eq!(finished.inserted, 2);
    assert_eq!(finished.errors, 1);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn snapshot_json_lines_with_an_unparseable_line_imports_the_rest() {
    let contents = r#"{"serialNumber": "A", "companyName": "Acme", "status": "Activ"}
{"serialNumber": "B", "companyNa
{"serialNumber": "C", "companyName": "Acme", "status": "Activ"}
"#;
    let path = temp_snapshot("truncated.jsonl", contents);
    let store = MemoryRecordStore::new();
    let sync = job(Scripted::new(|_| Err(outage())), store.clone());

    let finished = sync
        .import_from_snapshot(Some(path.clone()), "cli")
        .unwrap()
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.records_seen, 3);
    assert_eq!(finished.inserted, 2);
    assert_eq!(finished.errors, 1);
    assert!(store.get("B").await.is_none());
}

#[tokio::test]
async fn missing_snapshot_fails_the_job() {
    let sync = job(Scripted::new(|_| Err(outage())), MemoryRecordStore::new());

    let finished = sync.import_from_snapshot(None, "cli").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Failed);
    assert!(finished.current_step.contains("cannot read snapshot"));
    assert!(finished.finished_at.is_some());
}

#[tokio::test]
async fn empty_snapshot_completes_with_nothing() {
    let path = temp_snapshot("empty.json", "[]");
    let sync = job(Scripted::new(|_| Err(outage())), MemoryRecordStore::new());

    let finished = sync
        .import_from_snapshot(Some(path.clone()), "cli")
        .unwrap()
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.total_pages, Some(0));
    assert_eq!(finished.records_seen, 0);
}

// ---------------------------------------------------------------------------
// End to end over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn syncs_from_a_live_registry_endpoint() {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    let row = |serial: &str| {
        json!({
            "serial_number": serial,
            "company_name": "Acme Gaming SRL",
            "county": "MUNICIPIUL BUCUREȘTI",
            "city": "Sector 3",
            "status": "Activ"
        })
    };
    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [row("B-1"), row("B-2")],
            "has_more": true,
            "total_pages": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [row("B-3")],
            "has_more": false,
            "total_pages": 2
        })))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri(), 5, "onjn-test/0.1", 0, 0).unwrap();
    let store = MemoryRecordStore::new();
    let sync = RegistrySyncJob::new(client, store.clone(), JobStatusStore::new(), config());

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.total_pages, Some(2));
    assert_eq!(finished.inserted, 3);
    assert_eq!(store.get("B-3").await.unwrap().city, "Sector 3");
}

#[tokio::test]
async fn mistyped_row_from_the_registry_is_counted_not_fatal() {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                { "serialNumber": "G-1", "companyName": "Acme", "status": "Activ" },
                { "serialNumber": 7, "companyName": "Acme", "status": "Activ" }
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&server.uri(), 5, "onjn-test/0.1", 0, 0).unwrap();
    let store = MemoryRecordStore::new();
    let sync = RegistrySyncJob::new(client, store.clone(), JobStatusStore::new(), config());

    let finished = sync.start(None, "test").unwrap().await.unwrap();

    assert_eq!(finished.status, SyncStatus::Completed);
    assert_eq!(finished.inserted, 1);
    assert_eq!(finished.errors, 1);
    assert!(store.get("G-1").await.is_some());
}
