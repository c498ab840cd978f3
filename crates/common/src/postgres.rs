mod client;
mod config;
mod device_registry_repository;

pub use client::*;
pub use config::*;
pub use device_registry_repository::*;
