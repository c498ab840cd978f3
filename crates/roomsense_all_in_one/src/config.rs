use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Where device records and readings are kept
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL registry and ClickHouse readings
    Postgres,
    /// Process-local maps, lost on restart
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    /// Age after which a device is reported offline
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,

    // HTTP configuration
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Comma-separated allowed CORS origins, `*` for any
    #[serde(default = "default_http_cors_allowed_origins")]
    pub http_cors_allowed_origins: String,

    /// Comma-separated path prefixes excluded from request logging
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    // Auth configuration
    /// Shared HS256 secret of the identity provider
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    // ClickHouse configuration
    /// ClickHouse HTTP URL (for client connections)
    #[serde(default = "default_clickhouse_url")]
    pub clickhouse_url: String,

    /// ClickHouse native TCP address (for migrations with goose)
    #[serde(default = "default_clickhouse_native_url")]
    pub clickhouse_native_url: String,

    #[serde(default = "default_clickhouse_database")]
    pub clickhouse_database: String,

    #[serde(default = "default_clickhouse_username")]
    pub clickhouse_username: String,

    #[serde(default = "default_clickhouse_password")]
    pub clickhouse_password: String,

    #[serde(default = "default_clickhouse_readings_table")]
    pub clickhouse_readings_table: String,

    #[serde(default = "default_clickhouse_migrations_dir")]
    pub clickhouse_migrations_dir: String,

    /// Path to the goose binary used for both databases
    #[serde(default = "default_goose_binary_path")]
    pub goose_binary_path: String,

    // MQTT configuration
    #[serde(default)]
    pub mqtt_enabled: bool,

    #[serde(default = "default_mqtt_broker_url")]
    pub mqtt_broker_url: String,

    #[serde(default = "default_mqtt_topic")]
    pub mqtt_topic: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    #[serde(default)]
    pub mqtt_username: Option<String>,

    #[serde(default)]
    pub mqtt_password: Option<String>,

    #[serde(default)]
    pub mqtt_use_tls: bool,

    #[serde(default = "default_mqtt_max_retry_attempts")]
    pub mqtt_max_retry_attempts: u32,

    #[serde(default = "default_mqtt_retry_delay_secs")]
    pub mqtt_retry_delay_secs: u64,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Postgres
}

fn default_staleness_threshold_secs() -> u64 {
    600
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_cors_allowed_origins() -> String {
    "*".to_string()
}

fn default_http_ignored_paths() -> String {
    "/health".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "roomsense".to_string()
}

fn default_postgres_username() -> String {
    "roomsense".to_string()
}

fn default_postgres_password() -> String {
    "roomsense".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_migrations_dir() -> String {
    "/home/roomsense/migrations/postgres".to_string()
}

fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_native_url() -> String {
    "localhost:9000".to_string()
}

fn default_clickhouse_database() -> String {
    "roomsense".to_string()
}

fn default_clickhouse_username() -> String {
    "roomsense".to_string()
}

fn default_clickhouse_password() -> String {
    "roomsense".to_string()
}

fn default_clickhouse_readings_table() -> String {
    "telemetry_readings".to_string()
}

fn default_clickhouse_migrations_dir() -> String {
    "/home/roomsense/migrations/clickhouse".to_string()
}

fn default_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_mqtt_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_mqtt_topic() -> String {
    "sensors/+/data".to_string()
}

fn default_mqtt_client_id() -> String {
    "roomsense-ingester".to_string()
}

fn default_mqtt_max_retry_attempts() -> u32 {
    10
}

fn default_mqtt_retry_delay_secs() -> u64 {
    5
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "roomsense".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("ROOMSENSE"))
            .build()?
            .try_deserialize()
    }
}
