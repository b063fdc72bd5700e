//! Integration tests for `RegistryClient::fetch_page`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use onjn_registry::{RegistryClient, RegistryError};

/// 5-second timeout, descriptive UA, no retries.
fn test_client(base_url: &str) -> RegistryClient {
    RegistryClient::new(base_url, 5, "onjn-test/0.1", 0, 0).expect("failed to build test client")
}

fn test_client_with_retries(base_url: &str, max_retries: u32) -> RegistryClient {
    RegistryClient::new(base_url, 5, "onjn-test/0.1", max_retries, 0)
        .expect("failed to build test client")
}

fn page_json(serials: &[&str], has_more: bool, total_pages: Option<u32>) -> serde_json::Value {
    let records: Vec<_> = serials
        .iter()
        .map(|serial| {
            json!({
                "serial_number": serial,
                "equipment_type": "Mijloc de joc",
                "company_name": "Acme Gaming SRL",
                "brand_name": "Lucky Star",
                "county": "JUDEȚUL CLUJ",
                "city": "Cluj-Napoca",
                "slot_address": "Str. Horea nr. 3",
                "license_number": "L1-2024-0042",
                "authorization_date": "15.01.2024",
                "expiry_date": null,
                "status": "Activ"
            })
        })
        .collect();
    json!({ "records": records, "has_more": has_more, "total_pages": total_pages })
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_page_sends_page_and_size_and_parses_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
            &["SN-1", "SN-2"],
            true,
            Some(7),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_client(&server.uri())
        .fetch_page(2, 50)
        .await
        .expect("fetch_page should succeed");

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0]["serial_number"], "SN-1");
    assert!(page.has_more);
    assert_eq!(page.total_pages, Some(7));
}

#[tokio::test]
async fn fetch_page_tolerates_missing_pagination_fields() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .mount(&server)
        .await;

    let page = test_client(&server.uri()).fetch_page(1, 100).await.unwrap();
    assert!(page.records.is_empty());
    assert!(!page.has_more, "absent has_more must read as the last page");
    assert_eq!(page.total_pages, None);
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_page_maps_429_to_rate_limited_with_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri()).fetch_page(1, 100).await.unwrap_err();
    assert!(
        matches!(err, RegistryError::RateLimited { retry_after_secs: 30 }),
        "expected RateLimited(30), got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_page_maps_404_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = test_client(&server.uri()).fetch_page(1, 100).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }), "got: {err:?}");
}

#[tokio::test]
async fn fetch_page_rejects_non_page_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri()).fetch_page(1, 100).await.unwrap_err();
    assert!(
        matches!(err, RegistryError::Deserialize { ref context, .. } if context.contains("page 1")),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_page_keeps_mistyped_rows_for_the_caller() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                { "serial_number": "SN-1", "status": "Activ" },
                { "serial_number": 7, "county": { "name": "Cluj" } }
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let page = test_client(&server.uri()).fetch_page(1, 100).await.unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[1]["serial_number"], 7);
}

// ---------------------------------------------------------------------------
// Retries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_page_retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&["SN-1"], false, Some(1))))
        .expect(1)
        .mount(&server)
        .await;

    let page = test_client_with_retries(&server.uri(), 3)
        .fetch_page(1, 100)
        .await
        .expect("third attempt should succeed");
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn fetch_page_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slots"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client_with_retries(&server.uri(), 3)
        .fetch_page(1, 100)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::UnexpectedStatus { status: 403, .. }
    ));
}
