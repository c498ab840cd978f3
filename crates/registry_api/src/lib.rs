pub mod domain;
pub mod http;
pub mod payload;
pub mod registry_api;

pub use domain::*;
pub use http::RegistryApiServices;
pub use payload::*;
pub use registry_api::*;
