//! Configuration for the SQL diff worker.
//!
//! Provides environment detection, hierarchical loading from YAML files with
//! environment variable overrides, and the shared configuration types consumed
//! by the worker crate.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
