use super::{CanonicalId, DomainResult, Identity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Sensor values of a reading. Opaque to identity handling.
pub type TelemetryMetrics = serde_json::Map<String, serde_json::Value>;

/// One persisted measurement event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReading {
    /// Always present, even when the reading is tied to a canonical id.
    pub legacy_id: String,
    /// Set only when the hardware field normalized and a registry record exists.
    pub canonical_id: Option<CanonicalId>,
    /// Hardware field exactly as reported, kept even when it failed to normalize.
    pub reported_hardware_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub metrics: TelemetryMetrics,
}

impl TelemetryReading {
    pub fn identity(&self) -> Identity {
        match &self.canonical_id {
            Some(id) => Identity::Canonical(id.clone()),
            None => Identity::Legacy(self.legacy_id.clone()),
        }
    }
}

/// Append-only store of telemetry readings.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetryReadingRepository: Send + Sync {
    async fn store_reading(&self, reading: &TelemetryReading) -> DomainResult<()>;

    /// Latest reading for one identity. A `Legacy` identity only matches
    /// readings that carry no canonical id.
    async fn latest_reading(&self, identity: &Identity) -> DomainResult<Option<TelemetryReading>>;

    /// Latest reading per canonical id, plus latest reading per legacy id
    /// among readings without a canonical id.
    async fn latest_per_identity(&self) -> DomainResult<Vec<TelemetryReading>>;

    /// Legacy ids that have appeared on at least one reading carrying a canonical id.
    async fn associated_legacy_ids(&self) -> DomainResult<HashSet<String>>;
}
