use crate::domain::{
    CanonicalId, DeviceRecord, DeviceRegistryRepository, DomainResult,
    GetOrCreateDeviceRepoInput, RenameDeviceRepoInput,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Registry kept in a map. Insert-or-fetch happens under one write guard,
/// which is the atomic primitive this backend offers.
#[derive(Default)]
pub struct InMemoryDeviceRegistryRepository {
    records: RwLock<HashMap<CanonicalId, DeviceRecord>>,
}

impl InMemoryDeviceRegistryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRegistryRepository for InMemoryDeviceRegistryRepository {
    #[instrument(skip(self, input), fields(canonical_id = %input.canonical_id))]
    async fn get_or_create(&self, input: GetOrCreateDeviceRepoInput) -> DomainResult<DeviceRecord> {
        let mut records = self.records.write().await;
        let record = match records.entry(input.canonical_id) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let record = DeviceRecord {
                    canonical_id: slot.key().clone(),
                    display_name: input.default_name,
                    legacy_id: input.legacy_id,
                    created_at: input.seen_at,
                    updated_at: input.seen_at,
                    last_seen_at: input.seen_at,
                };
                debug!("registered device");
                slot.insert(record).clone()
            }
        };
        Ok(record)
    }

    async fn touch_last_seen(
        &self,
        canonical_id: &CanonicalId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(record) = self.records.write().await.get_mut(canonical_id) {
            record.last_seen_at = record.last_seen_at.max(at);
        }
        Ok(())
    }

    async fn rename(&self, input: RenameDeviceRepoInput) -> DomainResult<Option<DeviceRecord>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&input.canonical_id).map(|record| {
            record.display_name = input.display_name;
            record.updated_at = input.updated_at;
            record.clone()
        }))
    }

    async fn get(&self, canonical_id: &CanonicalId) -> DomainResult<Option<DeviceRecord>> {
        Ok(self.records.read().await.get(canonical_id).cloned())
    }

    async fn list_all(&self) -> DomainResult<Vec<DeviceRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}
