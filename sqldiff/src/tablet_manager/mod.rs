//! Replication control RPCs sent to individual tablets.

mod base;
pub mod memory;

pub use base::*;
