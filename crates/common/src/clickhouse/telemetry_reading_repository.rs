use crate::clickhouse::ClickHouseClient;
use crate::domain::{
    CanonicalId, DomainError, DomainResult, Identity, TelemetryMetrics, TelemetryReading,
    TelemetryReadingRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error, instrument};

/// Stored reading. An absent canonical id or hardware field is the empty string.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct TelemetryReadingRow {
    pub legacy_id: String,
    pub canonical_id: String,
    pub reported_hardware_id: String,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub recorded_at: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    pub received_at: DateTime<Utc>,
    /// JSON object serialized as a string
    pub metrics: String,
}

impl From<&TelemetryReading> for TelemetryReadingRow {
    fn from(reading: &TelemetryReading) -> Self {
        let metrics = serde_json::to_string(&reading.metrics).unwrap_or_else(|_| "{}".to_string());

        TelemetryReadingRow {
            legacy_id: reading.legacy_id.clone(),
            canonical_id: reading
                .canonical_id
                .as_ref()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default(),
            reported_hardware_id: reading.reported_hardware_id.clone().unwrap_or_default(),
            recorded_at: reading.recorded_at,
            received_at: reading.received_at,
            metrics,
        }
    }
}

impl From<TelemetryReadingRow> for TelemetryReading {
    fn from(row: TelemetryReadingRow) -> Self {
        TelemetryReading {
            legacy_id: row.legacy_id,
            canonical_id: non_empty(row.canonical_id).map(CanonicalId::from_stored),
            reported_hardware_id: non_empty(row.reported_hardware_id),
            recorded_at: row.recorded_at,
            received_at: row.received_at,
            metrics: parse_metrics(&row.metrics),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_metrics(raw: &str) -> TelemetryMetrics {
    serde_json::from_str(raw).unwrap_or_default()
}

fn storage_error(context: &'static str) -> impl Fn(clickhouse::error::Error) -> DomainError {
    move |e| {
        error!(error = %e, "{}", context);
        DomainError::StorageUnavailable(anyhow::Error::new(e).context(context))
    }
}

/// ClickHouse implementation of TelemetryReadingRepository
#[derive(Clone)]
pub struct ClickHouseTelemetryReadingRepository {
    client: ClickHouseClient,
    table: String,
}

impl ClickHouseTelemetryReadingRepository {
    pub fn new(client: ClickHouseClient, table: String) -> Self {
        Self { client, table }
    }

    async fn latest_for_canonical_ids(&self) -> DomainResult<Vec<TelemetryReading>> {
        // Aliases must not shadow source columns or argMax would nest aggregates.
        let sql = format!(
            "SELECT argMax(legacy_id, recorded_at) AS latest_legacy_id,
                    canonical_id,
                    argMax(reported_hardware_id, recorded_at) AS latest_reported_hardware_id,
                    max(recorded_at) AS latest_recorded_at,
                    argMax(received_at, recorded_at) AS latest_received_at,
                    argMax(metrics, recorded_at) AS latest_metrics
             FROM {}
             WHERE canonical_id != ''
             GROUP BY canonical_id",
            self.table
        );

        let rows = self
            .client
            .get_client()
            .query(&sql)
            .fetch_all::<LatestReadingRow>()
            .await
            .map_err(storage_error("failed to query latest canonical readings"))?;

        Ok(rows.into_iter().map(TelemetryReading::from).collect())
    }

    async fn latest_for_unregistered_legacy_ids(&self) -> DomainResult<Vec<TelemetryReading>> {
        let sql = format!(
            "SELECT legacy_id AS latest_legacy_id,
                    '' AS canonical_id,
                    argMax(reported_hardware_id, recorded_at) AS latest_reported_hardware_id,
                    max(recorded_at) AS latest_recorded_at,
                    argMax(received_at, recorded_at) AS latest_received_at,
                    argMax(metrics, recorded_at) AS latest_metrics
             FROM {} AS readings
             WHERE readings.canonical_id = ''
             GROUP BY legacy_id",
            self.table
        );

        let rows = self
            .client
            .get_client()
            .query(&sql)
            .fetch_all::<LatestReadingRow>()
            .await
            .map_err(storage_error("failed to query latest legacy readings"))?;

        Ok(rows.into_iter().map(TelemetryReading::from).collect())
    }
}

/// Aggregated latest reading for one identity key.
#[derive(Debug, Clone, Row, Deserialize)]
struct LatestReadingRow {
    latest_legacy_id: String,
    canonical_id: String,
    latest_reported_hardware_id: String,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    latest_recorded_at: DateTime<Utc>,
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    latest_received_at: DateTime<Utc>,
    latest_metrics: String,
}

impl From<LatestReadingRow> for TelemetryReading {
    fn from(row: LatestReadingRow) -> Self {
        TelemetryReadingRow {
            legacy_id: row.latest_legacy_id,
            canonical_id: row.canonical_id,
            reported_hardware_id: row.latest_reported_hardware_id,
            recorded_at: row.latest_recorded_at,
            received_at: row.latest_received_at,
            metrics: row.latest_metrics,
        }
        .into()
    }
}

#[derive(Debug, Row, Deserialize)]
struct LegacyIdRow {
    legacy_id: String,
}

#[async_trait]
impl TelemetryReadingRepository for ClickHouseTelemetryReadingRepository {
    #[instrument(skip(self, reading), fields(legacy_id = %reading.legacy_id, identity = %reading.identity()))]
    async fn store_reading(&self, reading: &TelemetryReading) -> DomainResult<()> {
        let row = TelemetryReadingRow::from(reading);

        let mut insert = self
            .client
            .get_client()
            .insert::<TelemetryReadingRow>(&self.table)
            .await
            .map_err(storage_error("failed to create ClickHouse insert"))?;

        insert
            .write(&row)
            .await
            .map_err(storage_error("failed to write reading to ClickHouse"))?;

        insert
            .end()
            .await
            .map_err(storage_error("failed to finalize ClickHouse insert"))?;

        debug!("stored telemetry reading");
        Ok(())
    }

    #[instrument(skip(self, identity), fields(identity = %identity))]
    async fn latest_reading(&self, identity: &Identity) -> DomainResult<Option<TelemetryReading>> {
        let query = match identity {
            Identity::Canonical(id) => self
                .client
                .get_client()
                .query(&format!(
                    "SELECT ?fields FROM {} WHERE canonical_id = ? ORDER BY recorded_at DESC LIMIT 1",
                    self.table
                ))
                .bind(id.as_str()),
            Identity::Legacy(legacy_id) => self
                .client
                .get_client()
                .query(&format!(
                    "SELECT ?fields FROM {} WHERE canonical_id = '' AND legacy_id = ? ORDER BY recorded_at DESC LIMIT 1",
                    self.table
                ))
                .bind(legacy_id.as_str()),
        };

        let row = query
            .fetch_optional::<TelemetryReadingRow>()
            .await
            .map_err(storage_error("failed to query latest reading"))?;

        Ok(row.map(TelemetryReading::from))
    }

    #[instrument(skip(self))]
    async fn latest_per_identity(&self) -> DomainResult<Vec<TelemetryReading>> {
        let mut readings = self.latest_for_canonical_ids().await?;
        readings.extend(self.latest_for_unregistered_legacy_ids().await?);
        debug!(count = readings.len(), "loaded latest readings per identity");
        Ok(readings)
    }

    #[instrument(skip(self))]
    async fn associated_legacy_ids(&self) -> DomainResult<HashSet<String>> {
        let sql = format!(
            "SELECT DISTINCT legacy_id FROM {} WHERE canonical_id != ''",
            self.table
        );

        let rows = self
            .client
            .get_client()
            .query(&sql)
            .fetch_all::<LegacyIdRow>()
            .await
            .map_err(storage_error("failed to query associated legacy ids"))?;

        Ok(rows.into_iter().map(|row| row.legacy_id).collect())
    }
}
