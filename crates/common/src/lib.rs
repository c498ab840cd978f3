pub mod auth;
pub mod clickhouse;
pub mod domain;
pub mod garde;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod telemetry;
