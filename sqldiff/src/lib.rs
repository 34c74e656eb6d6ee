//! Consistency checking between two sharded query results.
//!
//! A [`workers::sql_diff::SqlDiffWorker`] reserves one read-only replica per side, freezes
//! their replication, streams both query results through a [`diff::RowSubsetDiffer`] and
//! undoes every change made to the replicas through a [`cleaner::Cleaner`], whatever the
//! outcome of the run.
//!
//! The cluster is reached through the [`topology::TopologyDirectory`],
//! [`tablet_manager::TabletManager`] and [`query::QueryService`] traits, each shipped with an
//! in-memory implementation.

pub mod cleaner;
pub mod concurrency;
pub mod diff;
pub mod error;
mod macros;
pub mod metrics;
pub mod query;
pub mod tablet_manager;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod topology;
pub mod types;
pub mod workers;
