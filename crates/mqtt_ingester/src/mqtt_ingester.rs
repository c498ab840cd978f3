use crate::{run_mqtt_subscriber, MqttIngesterConfig};
use registry_api::TelemetryIngestionService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct MqttIngester {
    config: MqttIngesterConfig,
    ingestion_service: Arc<TelemetryIngestionService>,
}

impl MqttIngester {
    pub fn new(config: MqttIngesterConfig, ingestion_service: Arc<TelemetryIngestionService>) -> Self {
        debug!("Initializing MQTT ingester module");
        Self {
            config,
            ingestion_service,
        }
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
                run_mqtt_subscriber(self.config, self.ingestion_service, ctx).await
            })
        }
    }
}
