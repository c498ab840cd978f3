use axum::routing::{get, post};
use axum::Router;
use common::auth::AuthTokenProvider;
use common::http::{run_http_server, HttpServerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::handlers;
use crate::domain::{DeviceListingService, DeviceRenameService, TelemetryIngestionService};

/// Shared handler state
#[derive(Clone)]
pub struct RegistryApiServices {
    pub ingestion_service: Arc<TelemetryIngestionService>,
    pub rename_service: Arc<DeviceRenameService>,
    pub listing_service: Arc<DeviceListingService>,
    pub auth_token_provider: Arc<dyn AuthTokenProvider>,
}

pub fn build_router(services: RegistryApiServices) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/telemetry", post(handlers::ingest_telemetry))
        .route("/devices", get(handlers::list_devices))
        .route("/devices/:device_id", get(handlers::get_device))
        .route(
            "/devices/:device_id/display-name",
            post(handlers::rename_device),
        )
        .with_state(services)
}

pub async fn run_registry_http_server(
    config: HttpServerConfig,
    services: RegistryApiServices,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    run_http_server(config, build_router(services), cancellation_token).await
}
