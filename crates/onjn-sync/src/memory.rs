//! In-process [`RecordStore`] for tests and one-off CLI imports.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use onjn_core::{OperatorSlotRecord, RecordStore, SlotFilter, UpsertOutcome};
use tokio::sync::RwLock;

/// Records keyed by serial number. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<String, OperatorSlotRecord>>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn get(&self, serial_number: &str) -> Option<OperatorSlotRecord> {
        self.records.read().await.get(serial_number).cloned()
    }
}

impl RecordStore for MemoryRecordStore {
    type Error = Infallible;

    async fn upsert(&self, record: &OperatorSlotRecord) -> Result<UpsertOutcome, Infallible> {
        let previous = self
            .records
            .write()
            .await
            .insert(record.serial_number.clone(), record.clone());
        Ok(UpsertOutcome::from_is_new(previous.is_none()))
    }

    async fn query_all(&self, filter: &SlotFilter) -> Result<Vec<OperatorSlotRecord>, Infallible> {
        let records = self.records.read().await;
        let matching = records.values().filter(|r| filter.matches(r)).cloned();
        Ok(match filter.limit.and_then(|l| usize::try_from(l).ok()) {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }
}
