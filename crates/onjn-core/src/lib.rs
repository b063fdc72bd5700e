pub mod aggregate;
mod app_config;
mod config;
pub mod geography;
pub mod slots;
pub mod store;

pub use aggregate::{
    aggregate, aggregate_all, report, top_n, AggregateReport, AggregateViews, Dimension,
    GeographicAggregate,
};
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use geography::{classify_city, classify_county, normalize_city, normalize_county, GeoKey};
pub use slots::{OperatorSlotRecord, RecordError, SlotStatus};
pub use store::{RecordStore, SlotFilter, UpsertOutcome};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
