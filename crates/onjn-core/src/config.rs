use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("ONJN_ENV", "development"));
    let bind_addr = parse_addr("ONJN_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("ONJN_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("ONJN_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("ONJN_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("ONJN_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let registry_base_url = or_default("ONJN_REGISTRY_BASE_URL", "https://registru.onjn.gov.ro");
    let registry_page_size = parse_u32("ONJN_REGISTRY_PAGE_SIZE", "100")?;
    if registry_page_size == 0 {
        return Err(invalid(
            "ONJN_REGISTRY_PAGE_SIZE",
            "must be greater than zero".to_string(),
        ));
    }
    let registry_request_timeout_secs = parse_u64("ONJN_REGISTRY_REQUEST_TIMEOUT_SECS", "30")?;
    let registry_user_agent = or_default("ONJN_REGISTRY_USER_AGENT", "onjn-mirror/0.1 (registry-sync)");
    let registry_max_retries = parse_u32("ONJN_REGISTRY_MAX_RETRIES", "3")?;
    let registry_retry_backoff_base_ms = parse_u64("ONJN_REGISTRY_RETRY_BACKOFF_BASE_MS", "1000")?;

    let sync_default_max_pages = parse_u32("ONJN_SYNC_DEFAULT_MAX_PAGES", "1000")?;
    let sync_max_consecutive_failures = parse_u32("ONJN_SYNC_MAX_CONSECUTIVE_FAILURES", "3")?;
    if sync_max_consecutive_failures < 2 {
        return Err(invalid(
            "ONJN_SYNC_MAX_CONSECUTIVE_FAILURES",
            "must be at least 2 so a single transient page failure does not fail the sync"
                .to_string(),
        ));
    }
    let sync_inter_page_delay_ms = parse_u64("ONJN_SYNC_INTER_PAGE_DELAY_MS", "250")?;
    let sync_stale_after_secs = parse_u64("ONJN_SYNC_STALE_AFTER_SECS", "900")?;
    let sync_snapshot_path = PathBuf::from(or_default(
        "ONJN_SYNC_SNAPSHOT_PATH",
        "./data/onjn_snapshot.json",
    ));
    let sync_snapshot_chunk_size = parse_usize("ONJN_SYNC_SNAPSHOT_CHUNK_SIZE", "500")?.max(1);
    let sync_cron = optional("ONJN_SYNC_CRON");

    let own_company = optional("ONJN_OWN_COMPANY");
    let own_brand = optional("ONJN_OWN_BRAND");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        registry_base_url,
        registry_page_size,
        registry_request_timeout_secs,
        registry_user_agent,
        registry_max_retries,
        registry_retry_backoff_base_ms,
        sync_default_max_pages,
        sync_max_consecutive_failures,
        sync_inter_page_delay_ms,
        sync_stale_after_secs,
        sync_snapshot_path,
        sync_snapshot_chunk_size,
        sync_cron,
        own_company,
        own_brand,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
