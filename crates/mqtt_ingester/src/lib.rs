mod config;
mod mqtt_ingester;
mod subscriber;

pub use config::*;
pub use mqtt_ingester::*;
pub use subscriber::run_mqtt_subscriber;
