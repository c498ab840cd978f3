use chrono::{TimeDelta, Utc};
use common::domain::{
    DeviceRegistryRepository, DeviceStatus, DomainError, Identity, TelemetryReadingRepository,
};
use common::memory::{InMemoryDeviceRegistryRepository, InMemoryTelemetryReadingRepository};
use registry_api::{
    DeviceListingService, DeviceRenameService, IdentityResolver, IngestTelemetryRequest,
    RenameDeviceRequest, TelemetryIngestionService,
};
use std::sync::Arc;
use std::time::Duration;

const THRESHOLD: Duration = Duration::from_secs(600);

struct Harness {
    registry: Arc<InMemoryDeviceRegistryRepository>,
    readings: Arc<InMemoryTelemetryReadingRepository>,
    ingestion: Arc<TelemetryIngestionService>,
    rename: DeviceRenameService,
    listing: DeviceListingService,
}

impl Harness {
    fn new() -> Self {
        let registry = Arc::new(InMemoryDeviceRegistryRepository::new());
        let readings = Arc::new(InMemoryTelemetryReadingRepository::new());
        let resolver = Arc::new(IdentityResolver::new(registry.clone()));

        Self {
            ingestion: Arc::new(TelemetryIngestionService::new(resolver, readings.clone())),
            rename: DeviceRenameService::new(registry.clone()),
            listing: DeviceListingService::new(registry.clone(), readings.clone(), THRESHOLD),
            registry,
            readings,
        }
    }

    async fn ingest(&self, legacy_id: &str, mac: Option<&str>) -> Identity {
        let mut request = IngestTelemetryRequest::new(legacy_id);
        request.hardware_id = mac.map(str::to_string);
        request.co2 = Some(600.0);
        self.ingestion.ingest(request).await.unwrap().identity
    }

    async fn rename(&self, canonical_id: &str, name: &str) -> Result<String, DomainError> {
        self.rename
            .rename_device(RenameDeviceRequest {
                user_id: "admin".to_string(),
                canonical_id_raw: canonical_id.to_string(),
                display_name: name.to_string(),
            })
            .await
            .map(|record| record.display_name)
    }
}

#[tokio::test]
async fn test_reflashed_board_shows_as_new_device_without_merging() {
    let harness = Harness::new();

    harness.ingest("ESP8266A2", None).await;
    let devices = harness.listing.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].display_name, "ESP8266A2");
    assert_eq!(devices[0].identity, Identity::Legacy("ESP8266A2".to_string()));

    harness.ingest("RoomB", Some("AA:BB:CC:DD:EE:FF")).await;

    // Old legacy entry stays visible and goes offline once it stops reporting.
    let later = Utc::now() + TimeDelta::seconds(601);
    let devices = harness.listing.list_devices_at(later).await.unwrap();
    assert_eq!(devices.len(), 2);

    let esp = devices
        .iter()
        .find(|d| d.display_name == "ESP8266A2")
        .unwrap();
    assert_eq!(esp.status, DeviceStatus::Offline);
    assert!(esp.canonical_id.is_none());

    let room_b = devices.iter().find(|d| d.display_name == "RoomB").unwrap();
    assert_eq!(room_b.canonical_id.as_ref().unwrap().as_str(), "AA:BB:CC:DD:EE:FF");
}

#[tokio::test]
async fn test_same_hardware_with_new_legacy_id_is_one_device() {
    let harness = Harness::new();

    harness.ingest("RoomB", Some("aa:bb:cc:dd:ee:ff")).await;
    harness.ingest("RoomC", Some("AA-BB-CC-DD-EE-FF")).await;
    harness.ingest("RoomC", Some("aabbccddeeff")).await;

    let devices = harness.listing.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].display_name, "RoomB");
    assert_eq!(devices[0].legacy_id.as_deref(), Some("RoomB"));
    assert_eq!(harness.readings.len().await, 3);
}

#[tokio::test]
async fn test_concurrent_first_contact_creates_one_record() {
    let harness = Arc::new(Harness::new());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let harness = harness.clone();
        handles.push(tokio::spawn(async move {
            harness.ingest("RoomB", Some("AA:BB:CC:DD:EE:FF")).await
        }));
    }
    for handle in handles {
        assert!(matches!(handle.await.unwrap(), Identity::Canonical(_)));
    }

    let records = harness.registry.list_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(harness.readings.len().await, 32);
    assert_eq!(
        harness
            .readings
            .associated_legacy_ids()
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_rename_flow() {
    let harness = Harness::new();
    harness.ingest("RoomB", Some("AA:BB:CC:DD:EE:FF")).await;

    assert!(matches!(
        harness.rename("AA:BB:CC:DD:EE:FF", "").await,
        Err(DomainError::ValidationError(_))
    ));
    assert!(matches!(
        harness.rename("AA:BB:CC:DD:EE:FF", &"x".repeat(150)).await,
        Err(DomainError::ValidationError(_))
    ));
    assert_eq!(
        harness.rename("aa:bb:cc:dd:ee:ff", "Kitchen").await.unwrap(),
        "Kitchen"
    );

    let devices = harness.listing.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].display_name, "Kitchen");
    assert_eq!(devices[0].identity.key(), "AA:BB:CC:DD:EE:FF");

    // Telemetry after a rename keeps the chosen name.
    harness.ingest("RoomB", Some("AA:BB:CC:DD:EE:FF")).await;
    let devices = harness.listing.list_devices().await.unwrap();
    assert_eq!(devices[0].display_name, "Kitchen");
}

#[tokio::test]
async fn test_rename_never_seen_device_is_not_found() {
    let harness = Harness::new();
    assert!(matches!(
        harness.rename("11:22:33:44:55:66", "Lab").await,
        Err(DomainError::DeviceNotFound(_))
    ));
    assert!(harness.registry.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rename_to_same_name_is_idempotent() {
    let harness = Harness::new();
    harness.ingest("RoomB", Some("AA:BB:CC:DD:EE:FF")).await;
    let before = harness.registry.list_all().await.unwrap().remove(0);

    harness.rename("AA:BB:CC:DD:EE:FF", "RoomB").await.unwrap();
    harness.rename("AA:BB:CC:DD:EE:FF", "RoomB").await.unwrap();

    let after = harness.registry.list_all().await.unwrap().remove(0);
    assert_eq!(after.canonical_id, before.canonical_id);
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn test_staleness_threshold_boundaries() {
    let harness = Harness::new();
    let recorded_at = Utc::now() - TimeDelta::hours(1);

    let mut request = IngestTelemetryRequest::new("RoomB");
    request.hardware_id = Some("AA:BB:CC:DD:EE:FF".to_string());
    request.recorded_at = Some(recorded_at);
    harness.ingestion.ingest(request).await.unwrap();

    let inside = recorded_at + TimeDelta::seconds(599);
    let devices = harness.listing.list_devices_at(inside).await.unwrap();
    assert_eq!(devices[0].status, DeviceStatus::Online);

    let outside = recorded_at + TimeDelta::seconds(601);
    let devices = harness.listing.list_devices_at(outside).await.unwrap();
    assert_eq!(devices[0].status, DeviceStatus::Offline);
}

#[tokio::test]
async fn test_registered_device_without_readings_is_offline() {
    let harness = Harness::new();
    let now = Utc::now();
    harness
        .registry
        .get_or_create(common::domain::GetOrCreateDeviceRepoInput {
            canonical_id: common::domain::CanonicalId::parse("112233445566").unwrap(),
            default_name: "Attic".to_string(),
            legacy_id: None,
            seen_at: now,
        })
        .await
        .unwrap();

    let devices = harness.listing.list_devices_at(now).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].status, DeviceStatus::Offline);
    assert!(devices[0].latest_reading.is_none());
}
