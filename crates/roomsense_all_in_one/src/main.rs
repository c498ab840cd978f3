mod config;

use common::auth::{AuthTokenProvider, JwtAuthTokenProvider, JwtConfig};
use common::clickhouse::{ClickHouseClient, ClickHouseConfig, ClickHouseTelemetryReadingRepository};
use common::domain::{DeviceRegistryRepository, TelemetryReadingRepository};
use common::http::{CorsConfig, HttpLoggingConfig, HttpServerConfig};
use common::memory::{InMemoryDeviceRegistryRepository, InMemoryTelemetryReadingRepository};
use common::postgres::{PostgresClient, PostgresConfig, PostgresDeviceRegistryRepository};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use crate::config::{ServiceConfig, StorageBackend};
use goose::MigrationRunner;
use mqtt_ingester::{MqttIngester, MqttIngesterConfig};
use registry_api::{RegistryApi, RegistryApiServices};
use roomsense_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        storage_backend = ?config.storage_backend,
        "Starting roomsense service"
    );
    debug!("Configuration: {:?}", config);

    let stores = match initialize_stores(&config).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("Failed to initialize storage: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    if config.jwt_secret == "change-me-in-production" {
        warn!("using the default JWT secret, set ROOMSENSE_JWT_SECRET");
    }
    let auth_token_provider: Arc<dyn AuthTokenProvider> = Arc::new(JwtAuthTokenProvider::new(
        JwtConfig::new(config.jwt_secret.clone()),
    ));

    let services = RegistryApiServices::new(
        stores.device_registry,
        stores.telemetry_readings,
        auth_token_provider,
        Duration::from_secs(config.staleness_threshold_secs),
    );

    let mut runner = Runner::new();

    if config.mqtt_enabled {
        let mqtt_ingester = MqttIngester::new(
            MqttIngesterConfig {
                broker_url: config.mqtt_broker_url.clone(),
                topic: config.mqtt_topic.clone(),
                client_id: config.mqtt_client_id.clone(),
                username: config.mqtt_username.clone(),
                password: config.mqtt_password.clone(),
                use_tls: config.mqtt_use_tls,
                max_retry_attempts: config.mqtt_max_retry_attempts,
                retry_delay_secs: config.mqtt_retry_delay_secs,
            },
            services.ingestion_service.clone(),
        );
        runner = runner.with_named_process("mqtt_ingester", mqtt_ingester.into_runner_process());
    }

    let registry_api = RegistryApi::new(
        services,
        HttpServerConfig {
            host: config.http_host.clone(),
            port: config.http_port,
            logging_config: HttpLoggingConfig::from_comma_separated(&config.http_ignored_paths),
            cors_config: CorsConfig::from_comma_separated(&config.http_cors_allowed_origins),
        },
    );
    runner = runner.with_named_process("registry_api", registry_api.into_runner_process());

    runner = runner
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            // Flush pending traces and logs
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    if let Err(e) = runner.run().await {
        eprintln!("roomsense stopped with error: {:#}", e);
        std::process::exit(1);
    }
}

struct Stores {
    device_registry: Arc<dyn DeviceRegistryRepository>,
    telemetry_readings: Arc<dyn TelemetryReadingRepository>,
}

async fn initialize_stores(config: &ServiceConfig) -> anyhow::Result<Stores> {
    match config.storage_backend {
        StorageBackend::Memory => {
            warn!("using in-memory storage, data is lost on restart");
            Ok(Stores {
                device_registry: Arc::new(InMemoryDeviceRegistryRepository::new()),
                telemetry_readings: Arc::new(InMemoryTelemetryReadingRepository::new()),
            })
        }
        StorageBackend::Postgres => {
            info!("Initializing PostgreSQL...");
            let postgres_config = PostgresConfig {
                host: config.postgres_host.clone(),
                port: config.postgres_port,
                database: config.postgres_database.clone(),
                username: config.postgres_username.clone(),
                password: config.postgres_password.clone(),
                max_pool_size: config.postgres_max_pool_size,
            };
            MigrationRunner::new(
                config.goose_binary_path.clone(),
                config.postgres_migrations_dir.clone(),
                "postgres".to_string(),
                postgres_config.dsn(),
            )
            .run_migrations()
            .await?;
            let postgres_client = PostgresClient::new(&postgres_config)?;
            postgres_client.ping().await?;

            info!("Initializing ClickHouse...");
            let clickhouse_config = ClickHouseConfig {
                url: config.clickhouse_url.clone(),
                native_url: config.clickhouse_native_url.clone(),
                database: config.clickhouse_database.clone(),
                username: config.clickhouse_username.clone(),
                password: config.clickhouse_password.clone(),
                readings_table: config.clickhouse_readings_table.clone(),
            };
            MigrationRunner::new(
                config.goose_binary_path.clone(),
                config.clickhouse_migrations_dir.clone(),
                "clickhouse".to_string(),
                clickhouse_config.migration_dsn(),
            )
            .run_migrations()
            .await?;
            let clickhouse_client = ClickHouseClient::new(&clickhouse_config);
            clickhouse_client.ping().await?;

            Ok(Stores {
                device_registry: Arc::new(PostgresDeviceRegistryRepository::new(postgres_client)),
                telemetry_readings: Arc::new(ClickHouseTelemetryReadingRepository::new(
                    clickhouse_client,
                    clickhouse_config.readings_table,
                )),
            })
        }
    }
}
