//! Logging and metrics setup shared by processes embedding the SQL diff worker.

mod logging;
pub mod metrics;

pub use logging::*;
