mod client;
mod config;
mod telemetry_reading_repository;

pub use client::*;
pub use config::*;
pub use telemetry_reading_repository::*;
