//! Access to the cluster topology directory.

mod base;
pub mod memory;

pub use base::*;
