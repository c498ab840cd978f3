//! In-process stores for local runs and tests.

mod device_registry;
mod telemetry_readings;

pub use device_registry::*;
pub use telemetry_readings::*;
