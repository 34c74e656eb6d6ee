use std::time::Duration;
use tracing::info;

use crate::bail;
use crate::cleaner::Cleaner;
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};
use crate::error::{ErrorKind, SqlDiffResult};
use crate::tablet_manager::{TabletManager, TabletOperation, call_with_timeout};
use crate::topology::TopologyDirectory;
use crate::types::{TabletAlias, TabletType};

/// Replication control settings used while freezing the two tablets.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyncSettings {
    pub remote_call_timeout: Duration,
    pub settle_interval: Duration,
}

/// Stops replication on the subset tablet, then on the superset tablet.
///
/// The two tablets are not frozen atomically. Waiting `settle_interval` between both stops
/// gives in-flight changes time to reach the superset tablet, which makes the frozen data
/// comparable in practice but is not guaranteed to.
///
/// Each stopped tablet gets a cleanup action resuming replication, and its recorded type
/// change is retargeted to spare so the tablet is not served again with stale data.
pub(crate) async fn synchronize_replication<T, M>(
    topology: &T,
    tablet_manager: &M,
    cleaner: &Cleaner,
    subset: &TabletAlias,
    superset: &TabletAlias,
    settings: SyncSettings,
    shutdown_rx: &mut ShutdownRx,
) -> SqlDiffResult<()>
where
    T: TopologyDirectory,
    M: TabletManager,
{
    stop_replication(
        topology,
        tablet_manager,
        cleaner,
        subset,
        settings.remote_call_timeout,
    )
    .await?;

    shutdown_rx.check_interrupted()?;

    info!(
        settle_interval_ms = settings.settle_interval.as_millis() as u64,
        "waiting for replication to settle"
    );
    if let ShutdownResult::Shutdown(()) = settle(settings.settle_interval, shutdown_rx).await {
        bail!(
            ErrorKind::Interrupted,
            "Worker was interrupted",
            "while waiting for replication to settle"
        );
    }

    shutdown_rx.check_interrupted()?;

    stop_replication(
        topology,
        tablet_manager,
        cleaner,
        superset,
        settings.remote_call_timeout,
    )
    .await
}

async fn stop_replication<T, M>(
    topology: &T,
    tablet_manager: &M,
    cleaner: &Cleaner,
    alias: &TabletAlias,
    remote_call_timeout: Duration,
) -> SqlDiffResult<()>
where
    T: TopologyDirectory,
    M: TabletManager,
{
    let tablet = topology.get_tablet(alias).await?;

    call_with_timeout(
        TabletOperation::StopReplication,
        &tablet,
        remote_call_timeout,
        tablet_manager.stop_replication(&tablet),
    )
    .await?;
    cleaner.record_start_replication(alias.clone());
    cleaner.retarget_change_tablet_type(alias, TabletType::Spare)?;

    info!(tablet = %alias, "stopped replication");

    Ok(())
}

async fn settle(interval: Duration, shutdown_rx: &mut ShutdownRx) -> ShutdownResult<(), ()> {
    tokio::select! {
        biased;

        _ = shutdown_rx.wait() => ShutdownResult::Shutdown(()),
        _ = tokio::time::sleep(interval) => ShutdownResult::Ok(()),
    }
}
