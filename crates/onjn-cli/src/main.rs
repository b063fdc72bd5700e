mod report;
mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use onjn_core::Dimension;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "onjn-cli")]
#[command(about = "ONJN registry mirror command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run or inspect registry syncs
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Query the mirrored registry
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum SyncCommands {
    /// Page through the live registry and upsert every record
    Registry {
        /// Stop after this many pages (defaults to ONJN_SYNC_DEFAULT_MAX_PAGES)
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Import a locally captured snapshot (JSON array or JSON lines)
    Snapshot {
        /// Snapshot file (defaults to ONJN_SYNC_SNAPSHOT_PATH)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Load into memory and print the county view without touching the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the job status reported by a running server
    Status {
        /// Base URL of the onjn-server instance
        #[arg(long, env = "ONJN_SERVER_URL", default_value = "http://127.0.0.1:3000")]
        server: String,
        /// Bearer token for the server's protected routes
        #[arg(long, env = "ONJN_API_KEY")]
        api_key: Option<String>,
    },
    /// List recent sync runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Debug, Subcommand)]
enum ReportCommands {
    /// Group records by company, brand, county or city
    Aggregate {
        /// company | brand | county | city
        dimension: Dimension,
        /// Number of buckets to show
        #[arg(long, default_value = "10")]
        top: usize,
        #[arg(long)]
        county: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        /// Restrict to ONJN_OWN_COMPANY / ONJN_OWN_BRAND
        #[arg(long)]
        own: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Totals and the largest counties, cities and brands
    Stats {
        /// Number of rows per group
        #[arg(long, default_value = "10")]
        top: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("onjn-cli: no command given; run with --help for usage");
        return Ok(());
    };

    let config = onjn_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Commands that never touch the database.
    match &command {
        Commands::Sync {
            command: SyncCommands::Status { server, api_key },
        } => return sync::run_sync_status(server, api_key.as_deref()).await,
        Commands::Sync {
            command:
                SyncCommands::Snapshot {
                    path,
                    dry_run: true,
                },
        } => return sync::run_snapshot_dry_run(&config, path.clone()).await,
        _ => {}
    }

    let pool_config = onjn_db::PoolConfig::from_app_config(&config);
    let pool = onjn_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                onjn_db::health_check(&pool).await?;
                println!("database: ok");
            }
            DbCommands::Migrate => {
                let applied = onjn_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
            }
        },
        Commands::Sync { command } => match command {
            SyncCommands::Registry { max_pages } => {
                sync::run_sync_registry(&pool, &config, max_pages).await?;
            }
            SyncCommands::Snapshot { path, .. } => {
                sync::run_sync_snapshot(&pool, &config, path).await?;
            }
            SyncCommands::Runs { limit } => {
                sync::run_sync_runs(&pool, i64::from(limit)).await?;
            }
            SyncCommands::Status { .. } => {}
        },
        Commands::Report { command } => match command {
            ReportCommands::Aggregate {
                dimension,
                top,
                county,
                city,
                company,
                brand,
                own,
                json,
            } => {
                let filter = report::build_filter(&config, county, city, company, brand, own)?;
                report::run_report_aggregate(&pool, &filter, dimension, top, json).await?;
            }
            ReportCommands::Stats { top } => {
                report::run_report_stats(&pool, i64::from(top)).await?;
            }
        },
    }

    Ok(())
}
