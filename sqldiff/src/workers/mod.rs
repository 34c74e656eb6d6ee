pub mod base;
pub mod sql_diff;
pub mod status;
mod sync;
mod targets;
