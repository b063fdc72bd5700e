use onjn_registry::RegistryError;
use thiserror::Error;

use crate::status::JobKind;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A job is already running; the trigger is rejected, not queued.
    #[error("a {running} sync is already running")]
    AlreadyRunning { running: JobKind },

    #[error("snapshot import failed: {0}")]
    Snapshot(#[source] RegistryError),
}
