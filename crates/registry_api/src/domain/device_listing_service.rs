use chrono::{DateTime, Utc};
use common::domain::{
    normalize_hardware_id, CanonicalId, DeviceRecord, DeviceRegistryRepository, DeviceView,
    DomainError, DomainResult, Identity, TelemetryReading, TelemetryReadingRepository,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Builds the unified device list from the registry and the reading store.
///
/// Two disjoint groups are merged:
/// - every registered device, joined to its latest reading by canonical id
/// - every legacy id seen on readings without a canonical id, unless that
///   legacy id is already associated with a registered device
pub struct DeviceListingService {
    device_registry_repository: Arc<dyn DeviceRegistryRepository>,
    telemetry_reading_repository: Arc<dyn TelemetryReadingRepository>,
    staleness_threshold: Duration,
}

impl DeviceListingService {
    pub fn new(
        device_registry_repository: Arc<dyn DeviceRegistryRepository>,
        telemetry_reading_repository: Arc<dyn TelemetryReadingRepository>,
        staleness_threshold: Duration,
    ) -> Self {
        Self {
            device_registry_repository,
            telemetry_reading_repository,
            staleness_threshold,
        }
    }

    pub async fn list_devices(&self) -> DomainResult<Vec<DeviceView>> {
        self.list_devices_at(Utc::now()).await
    }

    /// List devices with status derived against `now`
    #[instrument(skip(self))]
    pub async fn list_devices_at(&self, now: DateTime<Utc>) -> DomainResult<Vec<DeviceView>> {
        let records = self.device_registry_repository.list_all().await?;
        let latest = self
            .telemetry_reading_repository
            .latest_per_identity()
            .await?;
        let excluded = self.associated_legacy_ids(&records).await?;

        let mut latest_by_canonical: HashMap<CanonicalId, TelemetryReading> = HashMap::new();
        let mut latest_by_legacy: HashMap<String, TelemetryReading> = HashMap::new();
        for reading in latest {
            match reading.canonical_id.clone() {
                Some(canonical_id) => {
                    latest_by_canonical.insert(canonical_id, reading);
                }
                None => {
                    latest_by_legacy.insert(reading.legacy_id.clone(), reading);
                }
            }
        }

        let mut views: Vec<DeviceView> = records
            .into_iter()
            .map(|record| {
                let reading = latest_by_canonical.get(&record.canonical_id);
                DeviceView::from_record(record, reading, now, self.staleness_threshold)
            })
            .collect();

        views.extend(
            latest_by_legacy
                .values()
                .filter(|reading| !excluded.contains(&reading.legacy_id))
                .map(|reading| DeviceView::from_legacy(reading, now, self.staleness_threshold)),
        );

        sort_for_presentation(&mut views);

        debug!(count = views.len(), "listed devices");
        Ok(views)
    }

    pub async fn find_device(&self, identifier: &str) -> DomainResult<DeviceView> {
        self.find_device_at(identifier, Utc::now()).await
    }

    /// Look a device up by hardware id, display name or legacy id, in that order
    #[instrument(skip(self))]
    pub async fn find_device_at(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<DeviceView> {
        let identifier = identifier.trim();

        if let Ok(canonical_id) = normalize_hardware_id(identifier) {
            if let Some(record) = self.device_registry_repository.get(&canonical_id).await? {
                return self.record_view(record, now).await;
            }
        }

        let mut records = self.device_registry_repository.list_all().await?;
        // Display names are not unique; the oldest registration wins.
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.canonical_id.cmp(&b.canonical_id))
        });

        let by_display_name = records
            .iter()
            .find(|record| record.display_name == identifier);
        let by_legacy_id = || {
            records
                .iter()
                .find(|record| record.legacy_id.as_deref() == Some(identifier))
        };
        if let Some(record) = by_display_name.or_else(by_legacy_id) {
            return self.record_view(record.clone(), now).await;
        }

        let excluded = self.associated_legacy_ids(&records).await?;
        if !excluded.contains(identifier) {
            let legacy = Identity::Legacy(identifier.to_string());
            if let Some(reading) = self
                .telemetry_reading_repository
                .latest_reading(&legacy)
                .await?
            {
                return Ok(DeviceView::from_legacy(
                    &reading,
                    now,
                    self.staleness_threshold,
                ));
            }
        }

        Err(DomainError::DeviceNotFound(identifier.to_string()))
    }

    async fn record_view(&self, record: DeviceRecord, now: DateTime<Utc>) -> DomainResult<DeviceView> {
        let identity = Identity::Canonical(record.canonical_id.clone());
        let reading = self
            .telemetry_reading_repository
            .latest_reading(&identity)
            .await?;
        Ok(DeviceView::from_record(
            record,
            reading.as_ref(),
            now,
            self.staleness_threshold,
        ))
    }

    /// Legacy ids that belong to the registered group and must not appear standalone
    async fn associated_legacy_ids(&self, records: &[DeviceRecord]) -> DomainResult<HashSet<String>> {
        let mut excluded = self
            .telemetry_reading_repository
            .associated_legacy_ids()
            .await?;
        excluded.extend(records.iter().filter_map(|record| record.legacy_id.clone()));
        Ok(excluded)
    }
}

fn sort_for_presentation(views: &mut [DeviceView]) {
    views.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then_with(|| a.identity.key().cmp(b.identity.key()))
    });
}
