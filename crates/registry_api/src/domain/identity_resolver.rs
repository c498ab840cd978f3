use chrono::{DateTime, Utc};
use common::domain::{
    normalize_hardware_id, CanonicalId, DeviceRecord, DeviceRegistryRepository,
    GetOrCreateDeviceRepoInput, Identity,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Maximum display name length in characters
pub const MAX_DISPLAY_NAME_CHARS: usize = 100;

/// Identity-relevant part of an inbound telemetry event
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub legacy_id: String,
    /// Hardware field exactly as received, if any
    pub hardware_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Outcome of identity resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub identity: Identity,
    /// Registry record backing a `Canonical` identity
    pub record: Option<DeviceRecord>,
}

impl Resolution {
    fn legacy(legacy_id: &str) -> Self {
        Self {
            identity: Identity::Legacy(legacy_id.to_string()),
            record: None,
        }
    }
}

/// Decides whether an event belongs to a registered hardware identity or to a
/// standalone legacy id, registering first contacts along the way.
///
/// Resolution never fails: anything that goes wrong on the hardware path
/// degrades to `Identity::Legacy` so the reading is still persisted.
pub struct IdentityResolver {
    device_registry_repository: Arc<dyn DeviceRegistryRepository>,
}

impl IdentityResolver {
    pub fn new(device_registry_repository: Arc<dyn DeviceRegistryRepository>) -> Self {
        Self {
            device_registry_repository,
        }
    }

    #[instrument(skip(self, event), fields(legacy_id = %event.legacy_id))]
    pub async fn resolve(&self, event: &TelemetryEvent) -> Resolution {
        let Some(raw) = event.hardware_id.as_deref() else {
            debug!("no hardware id reported, using legacy identity");
            return Resolution::legacy(&event.legacy_id);
        };

        let canonical_id = match normalize_hardware_id(raw) {
            Ok(canonical_id) => canonical_id,
            Err(e) => {
                warn!(hardware_id = %raw, error = %e, "malformed hardware id, falling back to legacy identity");
                return Resolution::legacy(&event.legacy_id);
            }
        };

        let input = GetOrCreateDeviceRepoInput {
            default_name: default_display_name(&event.legacy_id, &canonical_id),
            legacy_id: Some(event.legacy_id.clone()),
            seen_at: event.received_at,
            canonical_id: canonical_id.clone(),
        };

        let record = match self.device_registry_repository.get_or_create(input).await {
            Ok(record) => record,
            Err(e) => {
                warn!(canonical_id = %canonical_id, error = %e, "device registration failed, falling back to legacy identity");
                return Resolution::legacy(&event.legacy_id);
            }
        };

        if let Err(e) = self
            .device_registry_repository
            .touch_last_seen(&canonical_id, event.received_at)
            .await
        {
            warn!(canonical_id = %canonical_id, error = %e, "failed to update last_seen_at");
        }

        debug!(canonical_id = %canonical_id, "resolved canonical identity");

        Resolution {
            identity: Identity::Canonical(canonical_id),
            record: Some(record),
        }
    }
}

/// Name given to a device on first registration.
///
/// The legacy id is used when it is itself a valid display name, otherwise the
/// canonical id.
pub fn default_display_name(legacy_id: &str, canonical_id: &CanonicalId) -> String {
    let trimmed = legacy_id.trim();
    let chars = trimmed.chars().count();
    if (1..=MAX_DISPLAY_NAME_CHARS).contains(&chars) {
        trimmed.to_string()
    } else {
        canonical_id.to_string()
    }
}
