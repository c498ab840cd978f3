use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use common::auth::extract_user_context;
use common::domain::{DeviceRecord, DeviceView, DomainError, Identity};
use common::http::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::RegistryApiServices;
use crate::domain::RenameDeviceRequest;
use crate::payload::TelemetryPayload;

#[derive(Debug, Serialize)]
pub struct TelemetryAccepted {
    pub status: &'static str,
    pub identity: Identity,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RenameDisplayNameBody {
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceList {
    pub devices: Vec<DeviceView>,
    pub count: usize,
}

/// POST /telemetry
#[instrument(name = "IngestTelemetry", skip(services, body), fields(body_len = body.len()))]
pub async fn ingest_telemetry(
    State(services): State<RegistryApiServices>,
    body: Bytes,
) -> Result<Json<TelemetryAccepted>, ApiError> {
    let request = TelemetryPayload::from_slice(&body)?.into_request()?;
    let outcome = services.ingestion_service.ingest(request).await?;

    Ok(Json(TelemetryAccepted {
        status: "ok",
        identity: outcome.identity,
        recorded_at: outcome.recorded_at,
    }))
}

/// POST /devices/:device_id/display-name
#[instrument(name = "RenameDevice", skip(services, headers, body))]
pub async fn rename_device(
    State(services): State<RegistryApiServices>,
    Path(canonical_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<RenameDisplayNameBody>, JsonRejection>,
) -> Result<Json<DeviceRecord>, ApiError> {
    let user_context = extract_user_context(&headers, services.auth_token_provider.as_ref())?;
    let Json(body) = body.map_err(|e| DomainError::ValidationError(e.body_text()))?;

    let record = services
        .rename_service
        .rename_device(RenameDeviceRequest {
            user_id: user_context.user_id,
            canonical_id_raw: canonical_id,
            display_name: body.display_name,
        })
        .await?;

    Ok(Json(record))
}

/// GET /devices
#[instrument(name = "ListDevices", skip(services))]
pub async fn list_devices(
    State(services): State<RegistryApiServices>,
) -> Result<Json<DeviceList>, ApiError> {
    let devices = services.listing_service.list_devices().await?;
    debug!(count = devices.len(), "returning device list");

    Ok(Json(DeviceList {
        count: devices.len(),
        devices,
    }))
}

/// GET /devices/:device_id
#[instrument(name = "GetDevice", skip(services))]
pub async fn get_device(
    State(services): State<RegistryApiServices>,
    Path(identifier): Path<String>,
) -> Result<Json<DeviceView>, ApiError> {
    let device = services.listing_service.find_device(&identifier).await?;
    Ok(Json(device))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
