use super::{CanonicalId, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Registry entry for one piece of hardware.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub canonical_id: CanonicalId,
    pub display_name: String,
    /// Legacy identifier observed when the record was created; bookkeeping only.
    pub legacy_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Repository input for first-contact registration
#[derive(Debug, Clone, PartialEq)]
pub struct GetOrCreateDeviceRepoInput {
    pub canonical_id: CanonicalId,
    pub default_name: String,
    pub legacy_id: Option<String>,
    pub seen_at: DateTime<Utc>,
}

/// Repository input for changing a display name
#[derive(Debug, Clone, PartialEq)]
pub struct RenameDeviceRepoInput {
    pub canonical_id: CanonicalId,
    pub display_name: String,
    pub updated_at: DateTime<Utc>,
}

/// Durable store of device records keyed by canonical id.
///
/// Uniqueness of `canonical_id` is the store's job: `get_or_create` must be a
/// single atomic insert-or-fetch so concurrent first contacts converge on one
/// record without any application-level locking.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRegistryRepository: Send + Sync {
    /// Return the record for `canonical_id`, creating it from `input` if absent.
    /// The losing side of a creation race receives the winner's record.
    async fn get_or_create(&self, input: GetOrCreateDeviceRepoInput) -> DomainResult<DeviceRecord>;

    /// Best-effort bump of `last_seen_at`. Unknown ids are ignored.
    async fn touch_last_seen(&self, canonical_id: &CanonicalId, at: DateTime<Utc>)
        -> DomainResult<()>;

    /// Update `display_name` and `updated_at` only.
    /// Returns None if no record exists for the id.
    async fn rename(&self, input: RenameDeviceRepoInput) -> DomainResult<Option<DeviceRecord>>;

    async fn get(&self, canonical_id: &CanonicalId) -> DomainResult<Option<DeviceRecord>>;

    async fn list_all(&self) -> DomainResult<Vec<DeviceRecord>>;
}
