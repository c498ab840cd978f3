//! Wire format of telemetry events, shared by the HTTP and MQTT entry points.

use crate::domain::IngestTelemetryRequest;
use chrono::{DateTime, TimeZone, Utc};
use common::domain::{DomainError, DomainResult, TelemetryMetrics};
use serde::Deserialize;
use serde_json::Value;

/// Device clocks that never synced report times near the epoch; such
/// timestamps are ignored and the receipt time is used instead.
const MIN_DEVICE_TIMESTAMP_SECS: i64 = 946_684_800;

const TEMPERATURE_KEYS: [&str; 3] = ["temperature", "temp_scd41", "temp_sht40"];
const HUMIDITY_KEYS: [&str; 3] = ["humidity", "humidity_scd41", "humidity_sht40"];
const CO2_KEYS: [&str; 1] = ["co2"];

/// Telemetry event as published by the sensor firmware.
///
/// Older firmware reports only `device_id`. Newer firmware adds `mac_address`.
/// Some gateways relabel `device_id` as `legacy_id`; when both are present
/// `device_id` wins.
/// Sensor values may use the per-sensor names (`temp_scd41`, `humidity_sht40`, ...);
/// the first present name in order of preference wins.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub legacy_id: Option<String>,
    /// Any JSON type is accepted here; non-string values are treated as a
    /// malformed hardware id instead of rejecting the event.
    #[serde(default, alias = "mac")]
    pub mac_address: Option<Value>,
    /// Unix seconds or RFC 3339
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl TelemetryPayload {
    pub fn from_slice(bytes: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| DomainError::ValidationError(format!("Invalid telemetry payload: {}", e)))
    }

    pub fn into_request(self) -> DomainResult<IngestTelemetryRequest> {
        let recorded_at = match &self.timestamp {
            Some(value) => parse_timestamp(value)?,
            None => None,
        };

        let legacy_id = self
            .device_id
            .or(self.legacy_id)
            .ok_or_else(|| DomainError::ValidationError("device_id is required".to_string()))?;

        let mut request = IngestTelemetryRequest::new(legacy_id);
        request.hardware_id = self.mac_address.and_then(hardware_field);
        request.recorded_at = recorded_at;
        request.temperature = first_metric(&self.fields, &TEMPERATURE_KEYS)?;
        request.humidity = first_metric(&self.fields, &HUMIDITY_KEYS)?;
        request.co2 = first_metric(&self.fields, &CO2_KEYS)?;
        request.extra_metrics = extra_metrics(self.fields);

        Ok(request)
    }
}

fn hardware_field(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn parse_timestamp(value: &Value) -> DomainResult<Option<DateTime<Utc>>> {
    let invalid = || DomainError::ValidationError(format!("Invalid timestamp: {}", value));

    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => {
            let secs = n.as_f64().ok_or_else(invalid)?;
            from_unix_secs(secs).ok_or_else(invalid)?
        }
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(secs) => from_unix_secs(secs).ok_or_else(invalid)?,
            Err(_) => DateTime::parse_from_rfc3339(s.trim())
                .map_err(|_| invalid())?
                .with_timezone(&Utc),
        },
        _ => return Err(invalid()),
    };

    if parsed.timestamp() < MIN_DEVICE_TIMESTAMP_SECS {
        return Ok(None);
    }
    Ok(Some(parsed))
}

fn from_unix_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

fn metric_value(key: &str, value: &Value) -> DomainResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            DomainError::ValidationError(format!("{}: expected a number, got {:?}", key, s))
        }),
        other => Err(DomainError::ValidationError(format!(
            "{}: expected a number, got {}",
            key, other
        ))),
    }
}

fn first_metric(fields: &serde_json::Map<String, Value>, keys: &[&str]) -> DomainResult<Option<f64>> {
    for key in keys {
        if let Some(value) = fields.get(*key) {
            if let Some(parsed) = metric_value(key, value)? {
                return Ok(Some(parsed));
            }
        }
    }
    Ok(None)
}

/// Remaining numeric fields, kept under their reported names
fn extra_metrics(fields: serde_json::Map<String, Value>) -> TelemetryMetrics {
    let primary = [TEMPERATURE_KEYS[0], HUMIDITY_KEYS[0], CO2_KEYS[0]];
    fields
        .into_iter()
        .filter(|(key, value)| value.is_number() && !primary.contains(&key.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> DomainResult<IngestTelemetryRequest> {
        TelemetryPayload::from_slice(value.to_string().as_bytes())?.into_request()
    }

    #[test]
    fn test_decode_current_firmware_payload() {
        let request = decode(json!({
            "device_id": "RoomB",
            "mac_address": "aa:bb:cc:dd:ee:ff",
            "timestamp": 1740830400,
            "temperature": 21.5,
            "humidity": 40,
            "co2": 612
        }))
        .unwrap();

        assert_eq!(request.legacy_id, "RoomB");
        assert_eq!(request.hardware_id.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(request.recorded_at.unwrap().timestamp(), 1740830400);
        assert_eq!(request.temperature, Some(21.5));
        assert_eq!(request.humidity, Some(40.0));
        assert_eq!(request.co2, Some(612.0));
        assert!(request.extra_metrics.is_empty());
    }

    #[test]
    fn test_decode_legacy_sensor_field_names() {
        let request = decode(json!({
            "device_id": "ESP8266A2",
            "timestamp": "2025-03-01T12:00:00Z",
            "temp_sht40": 22.1,
            "temp_scd41": 22.8,
            "humidity_sht40": 41.0,
            "humidity_scd41": 39.5,
            "co2": 800
        }))
        .unwrap();

        assert!(request.hardware_id.is_none());
        assert_eq!(request.temperature, Some(22.8));
        assert_eq!(request.humidity, Some(39.5));
        assert_eq!(request.extra_metrics.get("temp_sht40"), Some(&json!(22.1)));
        assert!(!request.extra_metrics.contains_key("co2"));
    }

    #[test]
    fn test_decode_accepts_aliases_and_non_string_mac() {
        let request = decode(json!({"legacy_id": "RoomB", "mac": 42})).unwrap();
        assert_eq!(request.legacy_id, "RoomB");
        assert_eq!(request.hardware_id.as_deref(), Some("42"));

        let request = decode(json!({"device_id": "RoomB", "mac_address": null})).unwrap();
        assert!(request.hardware_id.is_none());
    }

    #[test]
    fn test_decode_device_id_wins_over_legacy_id() {
        let request = decode(json!({"legacy_id": "RoomC", "device_id": "RoomB"})).unwrap();
        assert_eq!(request.legacy_id, "RoomB");
        assert!(!request.extra_metrics.contains_key("legacy_id"));
    }

    #[test]
    fn test_decode_unsynced_clock_uses_receipt_time() {
        let request = decode(json!({"device_id": "RoomB", "timestamp": 4213})).unwrap();
        assert!(request.recorded_at.is_none());
    }

    #[test]
    fn test_decode_rejects_missing_legacy_id() {
        let result = decode(json!({"mac_address": "aa:bb:cc:dd:ee:ff"}));
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_decode_rejects_non_numeric_metric() {
        let result = decode(json!({"device_id": "RoomB", "co2": "lots"}));
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_decode_rejects_garbage_timestamp() {
        let result = decode(json!({"device_id": "RoomB", "timestamp": "yesterday"}));
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }
}
