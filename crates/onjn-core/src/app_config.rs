use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub registry_base_url: String,
    pub registry_page_size: u32,
    pub registry_request_timeout_secs: u64,
    pub registry_user_agent: String,
    pub registry_max_retries: u32,
    pub registry_retry_backoff_base_ms: u64,
    pub sync_default_max_pages: u32,
    /// Consecutive page failures that fail a sync. Always at least 2.
    pub sync_max_consecutive_failures: u32,
    pub sync_inter_page_delay_ms: u64,
    pub sync_stale_after_secs: u64,
    pub sync_snapshot_path: PathBuf,
    pub sync_snapshot_chunk_size: usize,
    pub sync_cron: Option<String>,
    pub own_company: Option<String>,
    pub own_brand: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("registry_base_url", &self.registry_base_url)
            .field("registry_page_size", &self.registry_page_size)
            .field(
                "registry_request_timeout_secs",
                &self.registry_request_timeout_secs,
            )
            .field("registry_user_agent", &self.registry_user_agent)
            .field("registry_max_retries", &self.registry_max_retries)
            .field(
                "registry_retry_backoff_base_ms",
                &self.registry_retry_backoff_base_ms,
            )
            .field("sync_default_max_pages", &self.sync_default_max_pages)
            .field(
                "sync_max_consecutive_failures",
                &self.sync_max_consecutive_failures,
            )
            .field("sync_inter_page_delay_ms", &self.sync_inter_page_delay_ms)
            .field("sync_stale_after_secs", &self.sync_stale_after_secs)
            .field("sync_snapshot_path", &self.sync_snapshot_path)
            .field("sync_snapshot_chunk_size", &self.sync_snapshot_chunk_size)
            .field("sync_cron", &self.sync_cron)
            .field("own_company", &self.own_company)
            .field("own_brand", &self.own_brand)
            .finish()
    }
}
