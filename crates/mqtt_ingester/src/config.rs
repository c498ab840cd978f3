use std::time::Duration;

/// Settings for the MQTT telemetry subscriber
#[derive(Debug, Clone)]
pub struct MqttIngesterConfig {
    /// `mqtt://host:port`, `tcp://host:port`, `mqtts://host:port` or `host:port`
    pub broker_url: String,
    pub topic: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Forced on by an `mqtts://` broker URL
    pub use_tls: bool,
    pub max_retry_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for MqttIngesterConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://localhost:1883".to_string(),
            topic: "sensors/+/data".to_string(),
            client_id: "roomsense-ingester".to_string(),
            username: None,
            password: None,
            use_tls: false,
            max_retry_attempts: 10,
            retry_delay_secs: 5,
        }
    }
}

impl MqttIngesterConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
