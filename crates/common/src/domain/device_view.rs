use super::{CanonicalId, DeviceRecord, Identity, TelemetryMetrics, TelemetryReading};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    /// Online while the latest reading is no older than `staleness_threshold`.
    /// Readings stamped in the future count as fresh.
    pub fn derive(
        last_reading_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        staleness_threshold: Duration,
    ) -> Self {
        let Some(last_reading_at) = last_reading_at else {
            return DeviceStatus::Offline;
        };

        match now.signed_duration_since(last_reading_at).to_std() {
            Ok(elapsed) if elapsed > staleness_threshold => DeviceStatus::Offline,
            _ => DeviceStatus::Online,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingSnapshot {
    pub recorded_at: DateTime<Utc>,
    pub metrics: TelemetryMetrics,
}

impl From<&TelemetryReading> for ReadingSnapshot {
    fn from(reading: &TelemetryReading) -> Self {
        Self {
            recorded_at: reading.recorded_at,
            metrics: reading.metrics.clone(),
        }
    }
}

/// Unified device entry served to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    pub identity: Identity,
    pub display_name: String,
    pub canonical_id: Option<CanonicalId>,
    pub legacy_id: Option<String>,
    pub status: DeviceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub latest_reading: Option<ReadingSnapshot>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceView {
    pub fn from_record(
        record: DeviceRecord,
        latest: Option<&TelemetryReading>,
        now: DateTime<Utc>,
        staleness_threshold: Duration,
    ) -> Self {
        let status = DeviceStatus::derive(latest.map(|r| r.recorded_at), now, staleness_threshold);

        Self {
            identity: Identity::Canonical(record.canonical_id.clone()),
            display_name: record.display_name,
            canonical_id: Some(record.canonical_id),
            legacy_id: record.legacy_id,
            status,
            last_seen_at: Some(record.last_seen_at),
            latest_reading: latest.map(ReadingSnapshot::from),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        }
    }

    /// Standalone device keyed by a legacy id that never reached the registry.
    pub fn from_legacy(
        latest: &TelemetryReading,
        now: DateTime<Utc>,
        staleness_threshold: Duration,
    ) -> Self {
        Self {
            identity: Identity::Legacy(latest.legacy_id.clone()),
            display_name: latest.legacy_id.clone(),
            canonical_id: None,
            legacy_id: Some(latest.legacy_id.clone()),
            status: DeviceStatus::derive(Some(latest.recorded_at), now, staleness_threshold),
            last_seen_at: Some(latest.received_at),
            latest_reading: Some(ReadingSnapshot::from(latest)),
            created_at: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const THRESHOLD: Duration = Duration::from_secs(600);

    #[test]
    fn test_status_inside_threshold_is_online() {
        let now = Utc::now();
        let last = now - TimeDelta::seconds(599);
        assert_eq!(DeviceStatus::derive(Some(last), now, THRESHOLD), DeviceStatus::Online);
    }

    #[test]
    fn test_status_at_threshold_is_online() {
        let now = Utc::now();
        let last = now - TimeDelta::seconds(600);
        assert_eq!(DeviceStatus::derive(Some(last), now, THRESHOLD), DeviceStatus::Online);
    }

    #[test]
    fn test_status_past_threshold_is_offline() {
        let now = Utc::now();
        let last = now - TimeDelta::seconds(601);
        assert_eq!(DeviceStatus::derive(Some(last), now, THRESHOLD), DeviceStatus::Offline);
    }

    #[test]
    fn test_status_without_reading_is_offline() {
        assert_eq!(
            DeviceStatus::derive(None, Utc::now(), THRESHOLD),
            DeviceStatus::Offline
        );
    }

    #[test]
    fn test_status_future_reading_is_online() {
        let now = Utc::now();
        let last = now + TimeDelta::seconds(30);
        assert_eq!(DeviceStatus::derive(Some(last), now, THRESHOLD), DeviceStatus::Online);
    }

    #[test]
    fn test_view_from_record_without_readings() {
        let now = Utc::now();
        let record = DeviceRecord {
            canonical_id: CanonicalId::parse("aabbccddeeff").unwrap(),
            display_name: "RoomB".to_string(),
            legacy_id: Some("RoomB".to_string()),
            created_at: now,
            updated_at: now,
            last_seen_at: now,
        };

        let view = DeviceView::from_record(record, None, now, THRESHOLD);
        assert_eq!(view.status, DeviceStatus::Offline);
        assert!(view.latest_reading.is_none());
        assert_eq!(view.identity.key(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(view.display_name, "RoomB");
    }
}
