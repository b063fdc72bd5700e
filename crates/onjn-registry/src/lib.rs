pub mod client;
pub mod error;
pub mod normalize;
mod rate_limit;
pub mod snapshot;
pub mod types;

pub use client::RegistryClient;
pub use error::RegistryError;
pub use normalize::{decode_row, normalize_record};
pub use snapshot::{load_snapshot, SnapshotRow};
pub use types::{RawSlotRecord, RegistryPage};
