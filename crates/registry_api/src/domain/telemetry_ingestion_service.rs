use super::{IdentityResolver, TelemetryEvent};
use chrono::{DateTime, Utc};
use common::domain::{
    DomainResult, Identity, TelemetryMetrics, TelemetryReading, TelemetryReadingRepository,
};
use garde::Validate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Validated ingestion input, decoupled from the wire payload
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct IngestTelemetryRequest {
    #[garde(length(chars, min = 1))]
    pub legacy_id: String,
    #[garde(skip)]
    pub hardware_id: Option<String>,
    /// Device clock; receipt time is used when absent
    #[garde(skip)]
    pub recorded_at: Option<DateTime<Utc>>,
    /// Degrees Celsius
    #[garde(range(min = -50.0, max = 100.0))]
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    #[garde(range(min = 0.0, max = 100.0))]
    pub humidity: Option<f64>,
    /// CO2 concentration in ppm
    #[garde(range(min = 400.0, max = 5000.0))]
    pub co2: Option<f64>,
    /// Any other sensor values, stored verbatim
    #[garde(skip)]
    pub extra_metrics: TelemetryMetrics,
}

impl IngestTelemetryRequest {
    pub fn new(legacy_id: impl Into<String>) -> Self {
        Self {
            legacy_id: legacy_id.into(),
            hardware_id: None,
            recorded_at: None,
            temperature: None,
            humidity: None,
            co2: None,
            extra_metrics: TelemetryMetrics::new(),
        }
    }

    fn metrics(&self) -> TelemetryMetrics {
        let mut metrics = self.extra_metrics.clone();
        for (name, value) in [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("co2", self.co2),
        ] {
            if let Some(value) = value {
                metrics.insert(name.to_string(), serde_json::Value::from(value));
            }
        }
        metrics
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub identity: Identity,
    pub recorded_at: DateTime<Utc>,
}

/// Persists telemetry readings tagged with their resolved identity
///
/// Flow:
/// 1. Validate metric ranges
/// 2. Resolve identity (never fails, degrades to legacy)
/// 3. Build the reading, `canonical_id` set only for canonical identities
/// 4. Append to the reading store
pub struct TelemetryIngestionService {
    identity_resolver: Arc<IdentityResolver>,
    telemetry_reading_repository: Arc<dyn TelemetryReadingRepository>,
}

impl TelemetryIngestionService {
    pub fn new(
        identity_resolver: Arc<IdentityResolver>,
        telemetry_reading_repository: Arc<dyn TelemetryReadingRepository>,
    ) -> Self {
        Self {
            identity_resolver,
            telemetry_reading_repository,
        }
    }

    #[instrument(skip(self, request), fields(legacy_id = %request.legacy_id))]
    pub async fn ingest(&self, request: IngestTelemetryRequest) -> DomainResult<IngestOutcome> {
        common::garde::validate(&request)?;

        let received_at = Utc::now();
        let event = TelemetryEvent {
            legacy_id: request.legacy_id.clone(),
            hardware_id: request.hardware_id.clone(),
            received_at,
        };

        let resolution = self.identity_resolver.resolve(&event).await;

        let reading = TelemetryReading {
            canonical_id: resolution.identity.canonical_id().cloned(),
            reported_hardware_id: request.hardware_id.clone(),
            recorded_at: request.recorded_at.unwrap_or(received_at),
            received_at,
            metrics: request.metrics(),
            legacy_id: request.legacy_id,
        };

        self.telemetry_reading_repository
            .store_reading(&reading)
            .await?;

        debug!(identity = %resolution.identity, "telemetry reading stored");

        Ok(IngestOutcome {
            identity: resolution.identity,
            recorded_at: reading.recorded_at,
        })
    }
}
