use chrono::Utc;
use common::domain::{
    normalize_hardware_id, DeviceRecord, DeviceRegistryRepository, DomainError, DomainResult,
    RenameDeviceRepoInput,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct RenameDeviceRequest {
    /// Authenticated caller, for the audit log
    pub user_id: String,
    pub canonical_id_raw: String,
    pub display_name: String,
}

#[derive(Debug, Validate)]
struct DisplayName<'a> {
    #[garde(length(chars, min = 1, max = 100))]
    value: &'a str,
}

/// Changes the user-facing name of a registered device.
///
/// Never creates records. Renaming to the current name succeeds and still
/// advances `updated_at`.
pub struct DeviceRenameService {
    device_registry_repository: Arc<dyn DeviceRegistryRepository>,
}

impl DeviceRenameService {
    pub fn new(device_registry_repository: Arc<dyn DeviceRegistryRepository>) -> Self {
        Self {
            device_registry_repository,
        }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id, canonical_id = %request.canonical_id_raw))]
    pub async fn rename_device(&self, request: RenameDeviceRequest) -> DomainResult<DeviceRecord> {
        let canonical_id = normalize_hardware_id(&request.canonical_id_raw)?;

        let display_name = request.display_name.trim();
        common::garde::validate(&DisplayName {
            value: display_name,
        })?;

        let record = self
            .device_registry_repository
            .rename(RenameDeviceRepoInput {
                canonical_id: canonical_id.clone(),
                display_name: display_name.to_string(),
                updated_at: Utc::now(),
            })
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(canonical_id.to_string()))?;

        info!(
            canonical_id = %record.canonical_id,
            display_name = %record.display_name,
            "device renamed"
        );
        Ok(record)
    }
}
