mod canonical_id;
mod device_record;
mod device_view;
mod identity;
mod result;
mod telemetry_reading;

pub use canonical_id::*;
pub use device_record::*;
pub use device_view::*;
pub use identity::*;
pub use result::*;
pub use telemetry_reading::*;
