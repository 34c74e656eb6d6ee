//! Streaming query execution against tablets.

mod base;
pub mod memory;

pub use base::*;
