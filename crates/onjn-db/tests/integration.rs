//! Offline unit tests for onjn-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::{NaiveDate, Utc};
use onjn_core::{AppConfig, Environment, SlotStatus};
use onjn_db::{DbError, PoolConfig, SlotRecordRow, SyncRunCounters};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        registry_base_url: "https://registry.example.ro".to_string(),
        registry_page_size: 100,
        registry_request_timeout_secs: 30,
        registry_user_agent: "ua".to_string(),
        registry_max_retries: 3,
        registry_retry_backoff_base_ms: 1000,
        sync_default_max_pages: 1000,
        sync_max_consecutive_failures: 3,
        sync_inter_page_delay_ms: 250,
        sync_stale_after_secs: 900,
        sync_snapshot_path: PathBuf::from("./data/onjn_snapshot.json"),
        sync_snapshot_chunk_size: 500,
        sync_cron: None,
        own_company: None,
        own_brand: None,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn make_row(status: &str) -> SlotRecordRow {
    SlotRecordRow {
        id: 1,
        serial_number: "EGT-1".to_string(),
        equipment_type: "slot".to_string(),
        company_name: "Acme Gaming SRL".to_string(),
        brand_name: Some("Lucky Star".to_string()),
        county: "Sector 2".to_string(),
        city: "București".to_string(),
        county_key: "București".to_string(),
        city_key: "București".to_string(),
        sector: Some("Sector 2".to_string()),
        slot_address: None,
        license_number: None,
        authorization_date: NaiveDate::from_ymd_opt(2024, 1, 15),
        expiry_date: None,
        status: status.to_string(),
        last_scraped_at: Utc::now(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn slot_record_row_converts_to_domain_record() {
    let record = make_row("suspended").into_record().unwrap();
    assert_eq!(record.serial_number, "EGT-1");
    assert_eq!(record.status, SlotStatus::Suspended);
    assert_eq!(record.county, "Sector 2", "published county is preserved");
    assert_eq!(record.authorization_date, NaiveDate::from_ymd_opt(2024, 1, 15));
}

#[test]
fn slot_record_row_with_unknown_status_is_invalid() {
    let err = make_row("pending").into_record().unwrap_err();
    assert!(matches!(err, DbError::InvalidRow { ref serial_number, .. } if serial_number == "EGT-1"));
}

#[test]
fn sync_run_counters_default_to_zero() {
    assert_eq!(
        SyncRunCounters::default(),
        SyncRunCounters {
            pages_processed: 0,
            records_seen: 0,
            inserted: 0,
            updated: 0,
            errors: 0,
        }
    );
}
