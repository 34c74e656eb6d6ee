use std::time::Duration;
use tracing::info;

use crate::cleaner::Cleaner;
use crate::error::SqlDiffResult;
use crate::tablet_manager::{TabletManager, TabletOperation, call_with_timeout};
use crate::topology::TopologyDirectory;
use crate::types::{TabletAlias, TabletType};

/// Finds an rdonly tablet serving `keyspace`/`shard` in `cell` and reserves it as a checker.
///
/// Once the type change succeeded, a cleanup action moving the tablet back to rdonly is
/// recorded in `cleaner`.
pub(crate) async fn find_target<T, M>(
    topology: &T,
    tablet_manager: &M,
    cleaner: &Cleaner,
    cell: &str,
    keyspace: &str,
    shard: &str,
    remote_call_timeout: Duration,
) -> SqlDiffResult<TabletAlias>
where
    T: TopologyDirectory,
    M: TabletManager,
{
    let alias = topology
        .find_tablet(cell, keyspace, shard, TabletType::Rdonly)
        .await?;
    let tablet = topology.get_tablet(&alias).await?;

    call_with_timeout(
        TabletOperation::ChangeTabletType,
        &tablet,
        remote_call_timeout,
        tablet_manager.change_tablet_type(&tablet, TabletType::Checker),
    )
    .await?;
    cleaner.record_change_tablet_type(alias.clone(), TabletType::Rdonly);

    info!(%keyspace, %shard, tablet = %alias, "reserved tablet as checker");

    Ok(alias)
}
