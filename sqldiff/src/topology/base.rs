use std::future::Future;

use crate::error::SqlDiffResult;
use crate::types::{TabletAlias, TabletInfo, TabletType};

/// Read access to the directory describing which tablets serve which keyspace shards.
///
/// Both lookups fail with [`crate::error::ErrorKind::ReplicaNotFound`] when nothing matches.
pub trait TopologyDirectory {
    /// Resolves one tablet of `tablet_type` serving `keyspace`/`shard` in `cell`.
    fn find_tablet(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> impl Future<Output = SqlDiffResult<TabletAlias>> + Send;

    /// Returns the current metadata of the tablet with `alias`.
    fn get_tablet(&self, alias: &TabletAlias)
    -> impl Future<Output = SqlDiffResult<TabletInfo>> + Send;
}
