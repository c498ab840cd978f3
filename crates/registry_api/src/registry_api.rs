use crate::domain::{
    DeviceListingService, DeviceRenameService, IdentityResolver, TelemetryIngestionService,
};
use crate::http::{run_registry_http_server, RegistryApiServices};
use common::auth::AuthTokenProvider;
use common::domain::{DeviceRegistryRepository, TelemetryReadingRepository};
use common::http::HttpServerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl RegistryApiServices {
    /// Wire every domain service over the two stores
    pub fn new(
        device_registry_repository: Arc<dyn DeviceRegistryRepository>,
        telemetry_reading_repository: Arc<dyn TelemetryReadingRepository>,
        auth_token_provider: Arc<dyn AuthTokenProvider>,
        staleness_threshold: Duration,
    ) -> Self {
        let identity_resolver = Arc::new(IdentityResolver::new(
            device_registry_repository.clone(),
        ));

        Self {
            ingestion_service: Arc::new(TelemetryIngestionService::new(
                identity_resolver,
                telemetry_reading_repository.clone(),
            )),
            rename_service: Arc::new(DeviceRenameService::new(
                device_registry_repository.clone(),
            )),
            listing_service: Arc::new(DeviceListingService::new(
                device_registry_repository,
                telemetry_reading_repository,
                staleness_threshold,
            )),
            auth_token_provider,
        }
    }
}

pub struct RegistryApi {
    services: RegistryApiServices,
    config: HttpServerConfig,
}

impl RegistryApi {
    pub fn new(services: RegistryApiServices, config: HttpServerConfig) -> Self {
        debug!("Initializing registry API module");
        Self { services, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move {
                run_registry_http_server(self.config, self.services, ctx).await
            })
        }
    }
}
