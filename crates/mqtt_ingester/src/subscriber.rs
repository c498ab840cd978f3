use crate::MqttIngesterConfig;
use anyhow::{anyhow, Context};
use registry_api::{TelemetryIngestionService, TelemetryPayload};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};

/// Run the MQTT subscriber until cancelled or out of retries.
///
/// Every publish on the configured topic is decoded as a telemetry payload and
/// handed to the ingestion service. Bad messages are logged and skipped.
#[instrument(name = "mqtt_subscriber", skip_all, fields(broker_url = %config.broker_url, topic = %config.topic))]
pub async fn run_mqtt_subscriber(
    config: MqttIngesterConfig,
    ingestion_service: Arc<TelemetryIngestionService>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    info!("starting MQTT subscriber");

    let mut retry_count = 0;

    loop {
        if cancellation_token.is_cancelled() {
            debug!("MQTT subscriber cancelled before connection");
            break;
        }

        match run_mqtt_connection(&config, &cancellation_token, Arc::clone(&ingestion_service))
            .await
        {
            Ok(()) => {
                debug!("MQTT subscriber stopped cleanly");
                break;
            }
            Err(e) => {
                error!(error = %e, "MQTT connection error");

                retry_count += 1;
                if retry_count >= config.max_retry_attempts {
                    return Err(e.context(format!(
                        "MQTT subscriber gave up after {} attempts",
                        config.max_retry_attempts
                    )));
                }

                warn!(
                    attempt = retry_count,
                    max_attempts = config.max_retry_attempts,
                    "retrying MQTT connection"
                );

                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = tokio::time::sleep(config.retry_delay()) => {}
                }
            }
        }
    }

    info!("MQTT subscriber stopped");
    Ok(())
}

async fn run_mqtt_connection(
    config: &MqttIngesterConfig,
    cancellation_token: &CancellationToken,
    ingestion_service: Arc<TelemetryIngestionService>,
) -> anyhow::Result<()> {
    let broker = parse_broker_url(&config.broker_url)?;

    let mut mqtt_options = MqttOptions::new(&config.client_id, broker.host, broker.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);
    if let Some(username) = &config.username {
        mqtt_options.set_credentials(username, config.password.clone().unwrap_or_default());
    }
    if config.use_tls || broker.tls {
        mqtt_options.set_transport(Transport::tls_with_default_config());
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);

    client
        .subscribe(&config.topic, QoS::AtLeastOnce)
        .await
        .context("failed to subscribe")?;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        handle_mqtt_message(
                            &publish.topic,
                            &publish.payload,
                            Arc::clone(&ingestion_service),
                        )
                        .await;
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        info!(topic = %config.topic, "subscribed to MQTT topic");
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(anyhow!("MQTT event loop error: {}", e));
                    }
                }
            }
        }
    }
}

/// Ingest one MQTT message in its own root span
pub(crate) async fn handle_mqtt_message(
    topic: &str,
    payload: &[u8],
    ingestion_service: Arc<TelemetryIngestionService>,
) {
    let span = info_span!(
        parent: Span::none(),
        "mqtt_message",
        topic = %topic,
        payload_size = payload.len(),
        legacy_id = tracing::field::Empty,
    );

    async {
        let request = match TelemetryPayload::from_slice(payload).and_then(|p| p.into_request()) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "undecodable telemetry message, skipping");
                return;
            }
        };

        Span::current().record("legacy_id", request.legacy_id.as_str());

        match ingestion_service.ingest(request).await {
            Ok(outcome) => debug!(identity = %outcome.identity, "telemetry ingested"),
            Err(e) => error!(error = %e, "failed to ingest telemetry message"),
        }
    }
    .instrument(span)
    .await
}

#[derive(Debug, PartialEq)]
pub(crate) struct BrokerAddress<'a> {
    pub host: &'a str,
    pub port: u16,
    pub tls: bool,
}

/// Parse `mqtt://host:port`, `tcp://host:port`, `mqtts://host:port` or `host:port`
pub(crate) fn parse_broker_url(url: &str) -> anyhow::Result<BrokerAddress<'_>> {
    let (rest, tls) = if let Some(rest) = url.strip_prefix("mqtts://") {
        (rest, true)
    } else if let Some(rest) = url.strip_prefix("ssl://") {
        (rest, true)
    } else {
        let rest = url.trim_start_matches("mqtt://");
        (rest.trim_start_matches("tcp://"), false)
    };
    let default_port = if tls { 8883 } else { 1883 };

    let parts: Vec<&str> = rest.split(':').collect();
    match parts.as_slice() {
        [host] if !host.is_empty() => Ok(BrokerAddress {
            host: *host,
            port: default_port,
            tls,
        }),
        [host, port] if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("invalid port in broker URL: {}", port))?;
            Ok(BrokerAddress {
                host: *host,
                port,
                tls,
            })
        }
        _ => Err(anyhow!("invalid broker URL format: {}", url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        DomainError, MockDeviceRegistryRepository, MockTelemetryReadingRepository,
        TelemetryReading,
    };
    use registry_api::IdentityResolver;

    fn service(readings: MockTelemetryReadingRepository) -> Arc<TelemetryIngestionService> {
        let registry = MockDeviceRegistryRepository::new();
        Arc::new(TelemetryIngestionService::new(
            Arc::new(IdentityResolver::new(Arc::new(registry))),
            Arc::new(readings),
        ))
    }

    #[test]
    fn test_parse_broker_url_with_port() {
        let broker = parse_broker_url("mqtt://localhost:1883").unwrap();
        assert_eq!(broker.host, "localhost");
        assert_eq!(broker.port, 1883);
        assert!(!broker.tls);
    }

    #[test]
    fn test_parse_broker_url_default_ports() {
        assert_eq!(parse_broker_url("broker.local").unwrap().port, 1883);

        let tls = parse_broker_url("mqtts://broker.hivemq.cloud").unwrap();
        assert_eq!(tls.port, 8883);
        assert!(tls.tls);
    }

    #[test]
    fn test_parse_broker_url_rejects_garbage() {
        assert!(parse_broker_url("tcp://host:port").is_err());
        assert!(parse_broker_url("a:b:c").is_err());
        assert!(parse_broker_url("mqtt://").is_err());
    }

    #[tokio::test]
    async fn test_handle_mqtt_message_ingests_payload() {
        let mut readings = MockTelemetryReadingRepository::new();
        readings
            .expect_store_reading()
            .withf(|reading: &TelemetryReading| {
                reading.legacy_id == "ESP8266A2"
                    && reading.metrics.get("co2") == Some(&serde_json::json!(700.0))
            })
            .times(1)
            .returning(|_| Ok(()));

        let payload = br#"{"device_id": "ESP8266A2", "co2": 700, "timestamp": 1740830400}"#;
        handle_mqtt_message("sensors/ESP8266A2/data", payload, service(readings)).await;
    }

    #[tokio::test]
    async fn test_handle_mqtt_message_skips_undecodable_payload() {
        let mut readings = MockTelemetryReadingRepository::new();
        readings.expect_store_reading().times(0);

        handle_mqtt_message("sensors/x/data", b"not json", service(readings)).await;
    }

    #[tokio::test]
    async fn test_handle_mqtt_message_survives_storage_failure() {
        let mut readings = MockTelemetryReadingRepository::new();
        readings
            .expect_store_reading()
            .times(1)
            .returning(|_| Err(DomainError::StorageUnavailable(anyhow!("down"))));

        handle_mqtt_message(
            "sensors/RoomB/data",
            br#"{"device_id": "RoomB"}"#,
            service(readings),
        )
        .await;
    }

    #[tokio::test]
    async fn test_subscriber_exits_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let result = run_mqtt_subscriber(
            MqttIngesterConfig::default(),
            service(MockTelemetryReadingRepository::new()),
            token,
        )
        .await;
        assert!(result.is_ok());
    }
}
