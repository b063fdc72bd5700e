//! Postgres-backed [`RecordStore`].

use onjn_core::{OperatorSlotRecord, RecordStore, SlotFilter, UpsertOutcome};
use sqlx::PgPool;

use crate::slot_records::{list_slot_records, upsert_slot_record, SlotRecordRow};
use crate::DbError;

/// [`RecordStore`] over the `slot_records` table. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordStore for PgRecordStore {
    type Error = DbError;

    async fn upsert(&self, record: &OperatorSlotRecord) -> Result<UpsertOutcome, DbError> {
        upsert_slot_record(&self.pool, record).await
    }

    async fn query_all(&self, filter: &SlotFilter) -> Result<Vec<OperatorSlotRecord>, DbError> {
        list_slot_records(&self.pool, filter)
            .await?
            .into_iter()
            .map(SlotRecordRow::into_record)
            .collect()
    }
}
