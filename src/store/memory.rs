use crate::store::{ProviderRecord, ProviderStore, StoreResult};
use std::sync::Mutex;

/// Provider store that keeps records in memory
#[derive(Debug, Default)]
pub struct InMemoryProviderStore {
    records: Mutex<Vec<ProviderRecord>>,
}

impl InMemoryProviderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every saved record, oldest first
    pub fn records(&self) -> Vec<ProviderRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProviderStore for InMemoryProviderStore {
    fn save(&self, record: &ProviderRecord) -> StoreResult<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
