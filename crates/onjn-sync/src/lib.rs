pub mod error;
pub mod memory;
pub mod runner;
pub mod source;
pub mod status;

pub use error::SyncError;
pub use memory::MemoryRecordStore;
pub use runner::{RegistrySyncJob, SyncConfig};
pub use source::PageSource;
pub use status::{JobKind, JobStatusStore, SyncJob, SyncOutcome, SyncStatus, SyncStatusView};
