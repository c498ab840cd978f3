pub mod handlers;
mod router;

pub use router::*;
