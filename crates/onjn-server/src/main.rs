mod api;
mod history;
mod middleware;
mod scheduler;

use std::sync::Arc;

use onjn_db::PgRecordStore;
use onjn_registry::RegistryClient;
use onjn_sync::{JobStatusStore, RegistrySyncJob, SyncConfig};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(onjn_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = onjn_db::PoolConfig::from_app_config(&config);
    let pool = onjn_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = onjn_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let registry = RegistryClient::new(
        &config.registry_base_url,
        config.registry_request_timeout_secs,
        &config.registry_user_agent,
        config.registry_max_retries,
        config.registry_retry_backoff_base_ms,
    )?;
    let store = PgRecordStore::new(pool.clone());
    let jobs = JobStatusStore::new();
    let sync = RegistrySyncJob::new(
        registry,
        store.clone(),
        jobs.clone(),
        SyncConfig::from_app_config(&config),
    );

    let _history = history::spawn_history_recorder(pool.clone(), &jobs);
    let _scheduler = scheduler::build_scheduler(sync.clone(), config.sync_cron.as_deref()).await?;

    let auth = AuthState::from_env(matches!(config.env, onjn_core::Environment::Development))?;
    let state = AppState {
        pool,
        store,
        sync,
        config: Arc::clone(&config),
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "onjn-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
