use crate::domain::{
    CanonicalId, DeviceRecord, DeviceRegistryRepository, DomainError, DomainResult,
    GetOrCreateDeviceRepoInput, RenameDeviceRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, instrument};

const DEVICE_COLUMNS: &str =
    "canonical_id, display_name, legacy_id, created_at, updated_at, last_seen_at";

/// Device registry row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct DeviceRegistryRow {
    pub canonical_id: String,
    pub display_name: String,
    pub legacy_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl TryFrom<&Row> for DeviceRegistryRow {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            canonical_id: row.try_get("canonical_id")?,
            display_name: row.try_get("display_name")?,
            legacy_id: row.try_get("legacy_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            last_seen_at: row.try_get("last_seen_at")?,
        })
    }
}

impl From<DeviceRegistryRow> for DeviceRecord {
    fn from(row: DeviceRegistryRow) -> Self {
        DeviceRecord {
            canonical_id: CanonicalId::from_stored(row.canonical_id),
            display_name: row.display_name,
            legacy_id: row.legacy_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_seen_at: row.last_seen_at,
        }
    }
}

fn to_record(row: &Row) -> DomainResult<DeviceRecord> {
    DeviceRegistryRow::try_from(row)
        .map(DeviceRecord::from)
        .map_err(|e| DomainError::StorageUnavailable(e.into()))
}

/// PostgreSQL implementation of DeviceRegistryRepository
#[derive(Clone)]
pub struct PostgresDeviceRegistryRepository {
    client: PostgresClient,
}

impl PostgresDeviceRegistryRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn connection(&self) -> DomainResult<deadpool_postgres::Client> {
        self.client
            .get_connection()
            .await
            .map_err(DomainError::StorageUnavailable)
    }
}

#[async_trait]
impl DeviceRegistryRepository for PostgresDeviceRegistryRepository {
    #[instrument(skip(self, input), fields(canonical_id = %input.canonical_id))]
    async fn get_or_create(&self, input: GetOrCreateDeviceRepoInput) -> DomainResult<DeviceRecord> {
        let conn = self.connection().await?;

        // The no-op DO UPDATE makes RETURNING yield the existing row on conflict,
        // so racing writers all read back the single committed record.
        let statement = format!(
            "INSERT INTO device_registry ({DEVICE_COLUMNS})
             VALUES ($1, $2, $3, $4, $4, $4)
             ON CONFLICT (canonical_id) DO UPDATE SET canonical_id = EXCLUDED.canonical_id
             RETURNING {DEVICE_COLUMNS}"
        );

        let row = conn
            .query_one(
                &statement,
                &[
                    &input.canonical_id.as_str(),
                    &input.default_name,
                    &input.legacy_id,
                    &input.seen_at,
                ],
            )
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.into()))?;

        let record = to_record(&row)?;
        debug!(display_name = %record.display_name, "resolved registry record");
        Ok(record)
    }

    #[instrument(skip(self, canonical_id), fields(canonical_id = %canonical_id))]
    async fn touch_last_seen(
        &self,
        canonical_id: &CanonicalId,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let conn = self.connection().await?;

        conn.execute(
            "UPDATE device_registry SET last_seen_at = GREATEST(last_seen_at, $2)
             WHERE canonical_id = $1",
            &[&canonical_id.as_str(), &at],
        )
        .await
        .map_err(|e| DomainError::StorageUnavailable(e.into()))?;

        Ok(())
    }

    #[instrument(skip(self, input), fields(canonical_id = %input.canonical_id, display_name = %input.display_name))]
    async fn rename(&self, input: RenameDeviceRepoInput) -> DomainResult<Option<DeviceRecord>> {
        let conn = self.connection().await?;

        let statement = format!(
            "UPDATE device_registry SET display_name = $2, updated_at = $3
             WHERE canonical_id = $1
             RETURNING {DEVICE_COLUMNS}"
        );

        let row = conn
            .query_opt(
                &statement,
                &[
                    &input.canonical_id.as_str(),
                    &input.display_name,
                    &input.updated_at,
                ],
            )
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.into()))?;

        match row {
            Some(row) => {
                debug!("renamed device");
                to_record(&row).map(Some)
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, canonical_id), fields(canonical_id = %canonical_id))]
    async fn get(&self, canonical_id: &CanonicalId) -> DomainResult<Option<DeviceRecord>> {
        let conn = self.connection().await?;

        let statement =
            format!("SELECT {DEVICE_COLUMNS} FROM device_registry WHERE canonical_id = $1");

        let row = conn
            .query_opt(&statement, &[&canonical_id.as_str()])
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.into()))?;

        row.as_ref().map(to_record).transpose()
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> DomainResult<Vec<DeviceRecord>> {
        let conn = self.connection().await?;

        let statement = format!("SELECT {DEVICE_COLUMNS} FROM device_registry");

        let rows = conn
            .query(&statement, &[])
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.into()))?;

        let records = rows.iter().map(to_record).collect::<DomainResult<Vec<_>>>()?;
        debug!(count = records.len(), "listed registry records");
        Ok(records)
    }
}
