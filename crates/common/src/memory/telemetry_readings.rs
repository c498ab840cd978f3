use crate::domain::{DomainResult, Identity, TelemetryReading, TelemetryReadingRepository};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Reading store kept in a vector, newest last.
#[derive(Default)]
pub struct InMemoryTelemetryReadingRepository {
    readings: RwLock<Vec<TelemetryReading>>,
}

impl InMemoryTelemetryReadingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }
}

fn matches_identity(reading: &TelemetryReading, identity: &Identity) -> bool {
    match identity {
        Identity::Canonical(id) => reading.canonical_id.as_ref() == Some(id),
        Identity::Legacy(legacy_id) => {
            reading.canonical_id.is_none() && &reading.legacy_id == legacy_id
        }
    }
}

#[async_trait]
impl TelemetryReadingRepository for InMemoryTelemetryReadingRepository {
    async fn store_reading(&self, reading: &TelemetryReading) -> DomainResult<()> {
        self.readings.write().await.push(reading.clone());
        Ok(())
    }

    async fn latest_reading(&self, identity: &Identity) -> DomainResult<Option<TelemetryReading>> {
        let readings = self.readings.read().await;
        Ok(readings
            .iter()
            .filter(|r| matches_identity(r, identity))
            .max_by_key(|r| r.recorded_at)
            .cloned())
    }

    async fn latest_per_identity(&self) -> DomainResult<Vec<TelemetryReading>> {
        let readings = self.readings.read().await;
        let mut latest: HashMap<Identity, &TelemetryReading> = HashMap::new();

        for reading in readings.iter() {
            latest
                .entry(reading.identity())
                .and_modify(|current| {
                    if reading.recorded_at >= current.recorded_at {
                        *current = reading;
                    }
                })
                .or_insert(reading);
        }

        Ok(latest.into_values().cloned().collect())
    }

    async fn associated_legacy_ids(&self) -> DomainResult<HashSet<String>> {
        let readings = self.readings.read().await;
        Ok(readings
            .iter()
            .filter(|r| r.canonical_id.is_some())
            .map(|r| r.legacy_id.clone())
            .collect())
    }
}
