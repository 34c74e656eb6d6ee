//! Cooperative cancellation shared between a worker and its controllers.

pub mod shutdown;
pub mod signal;
