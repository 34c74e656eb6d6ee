use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info};

use crate::error::{ErrorKind, SqlDiffError, SqlDiffResult};
use crate::tablet_manager::{TabletManager, TabletOperation, call_with_timeout};
use crate::topology::TopologyDirectory;
use crate::types::{TabletAlias, TabletType};
use crate::{bail, sqldiff_error};

/// Compensating action undoing one destructive step performed on a tablet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanerAction {
    /// Moves the tablet back to `tablet_type`.
    ChangeTabletType {
        alias: TabletAlias,
        tablet_type: TabletType,
    },
    /// Resumes replication on the tablet.
    StartReplication { alias: TabletAlias },
}

impl CleanerAction {
    pub fn alias(&self) -> &TabletAlias {
        match self {
            CleanerAction::ChangeTabletType { alias, .. } => alias,
            CleanerAction::StartReplication { alias } => alias,
        }
    }

    fn operation(&self) -> TabletOperation {
        match self {
            CleanerAction::ChangeTabletType { .. } => TabletOperation::ChangeTabletType,
            CleanerAction::StartReplication { .. } => TabletOperation::StartReplication,
        }
    }
}

impl fmt::Display for CleanerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanerAction::ChangeTabletType { alias, tablet_type } => {
                write!(f, "ChangeTabletType({alias}, {tablet_type})")
            }
            CleanerAction::StartReplication { alias } => write!(f, "StartReplication({alias})"),
        }
    }
}

/// Ordered stack of [`CleanerAction`]s recorded while a worker runs.
///
/// Actions are recorded right after the step they undo has succeeded. [`Cleaner::clean_up`]
/// drains the stack once, last recorded first, and runs every action even when earlier ones
/// fail.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    actions: Arc<Mutex<Vec<CleanerAction>>>,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: CleanerAction) {
        info!(%action, "recording cleanup action");
        self.lock().push(action);
    }

    pub fn record_change_tablet_type(&self, alias: TabletAlias, tablet_type: TabletType) {
        self.record(CleanerAction::ChangeTabletType { alias, tablet_type });
    }

    pub fn record_start_replication(&self, alias: TabletAlias) {
        self.record(CleanerAction::StartReplication { alias });
    }

    /// Changes the target type of the recorded [`CleanerAction::ChangeTabletType`] for `alias`.
    ///
    /// Fails with [`ErrorKind::InvalidState`] when no such action was recorded.
    pub fn retarget_change_tablet_type(
        &self,
        alias: &TabletAlias,
        tablet_type: TabletType,
    ) -> SqlDiffResult<()> {
        let mut actions = self.lock();
        let recorded = actions.iter_mut().rev().find_map(|action| match action {
            CleanerAction::ChangeTabletType {
                alias: recorded_alias,
                tablet_type: recorded_type,
            } if recorded_alias == alias => Some(recorded_type),
            _ => None,
        });

        let Some(recorded) = recorded else {
            bail!(
                ErrorKind::InvalidState,
                "No tablet type change recorded for tablet",
                alias
            );
        };

        *recorded = tablet_type;

        Ok(())
    }

    /// Returns a copy of the pending actions in recording order.
    pub fn actions(&self) -> Vec<CleanerAction> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs and removes every pending action, last recorded first.
    ///
    /// Each action looks up the current tablet metadata and performs its call bounded by
    /// `timeout`. Failures do not stop the drain, they are returned together as one
    /// [`SqlDiffError::many`] of [`ErrorKind::CleanupFailed`] errors.
    pub async fn clean_up<T, M>(
        &self,
        topology: &T,
        tablet_manager: &M,
        timeout: Duration,
    ) -> SqlDiffResult<()>
    where
        T: TopologyDirectory,
        M: TabletManager,
    {
        let actions = std::mem::take(&mut *self.lock());
        if actions.is_empty() {
            return Ok(());
        }

        info!(actions = actions.len(), "running cleanup actions");

        let mut errors = Vec::new();
        for action in actions.into_iter().rev() {
            if let Err(err) = Self::run_action(&action, topology, tablet_manager, timeout).await {
                error!(%action, error = %err, "cleanup action failed");
                errors.push(sqldiff_error!(
                    ErrorKind::CleanupFailed,
                    "Cleanup action failed",
                    format!("{action}: {err}")
                ));
            }
        }

        if errors.is_empty() {
            return Ok(());
        }

        Err(SqlDiffError::many(errors))
    }

    async fn run_action<T, M>(
        action: &CleanerAction,
        topology: &T,
        tablet_manager: &M,
        timeout: Duration,
    ) -> SqlDiffResult<()>
    where
        T: TopologyDirectory,
        M: TabletManager,
    {
        let tablet = topology.get_tablet(action.alias()).await?;

        match action {
            CleanerAction::ChangeTabletType { tablet_type, .. } => {
                call_with_timeout(
                    action.operation(),
                    &tablet,
                    timeout,
                    tablet_manager.change_tablet_type(&tablet, *tablet_type),
                )
                .await
            }
            CleanerAction::StartReplication { .. } => {
                call_with_timeout(
                    action.operation(),
                    &tablet,
                    timeout,
                    tablet_manager.start_replication(&tablet),
                )
                .await
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CleanerAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
