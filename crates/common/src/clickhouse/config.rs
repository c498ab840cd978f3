use serde::{Deserialize, Serialize};

/// ClickHouse configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// HTTP interface used by the client
    pub url: String,
    /// Native TCP address used by goose migrations
    pub native_url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub readings_table: String,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            native_url: "localhost:9000".to_string(),
            database: "roomsense".to_string(),
            username: "roomsense".to_string(),
            password: "roomsense".to_string(),
            readings_table: "telemetry_readings".to_string(),
        }
    }
}

impl ClickHouseConfig {
    /// DSN for the goose clickhouse driver
    pub fn migration_dsn(&self) -> String {
        format!(
            "clickhouse://{}:{}@{}/{}",
            self.username, self.password, self.native_url, self.database
        )
    }
}
