//! Ordered comparison of two query result streams.

mod differ;
mod report;

pub use differ::*;
pub use report::*;
