//! Helpers for testing workers and differs against in-memory collaborators.
pub mod cluster;
pub mod rows;
