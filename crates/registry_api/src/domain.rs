mod device_listing_service;
mod device_rename_service;
mod identity_resolver;
mod telemetry_ingestion_service;

pub use device_listing_service::*;
pub use device_rename_service::*;
pub use identity_resolver::*;
pub use telemetry_ingestion_service::*;
