use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SqlDiffResult};
use crate::tablet_manager::{TabletManager, TabletOperation};
use crate::topology::memory::MemoryTopology;
use crate::types::{TabletAlias, TabletInfo, TabletType};

/// A call received by [`MemoryTabletManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabletCall {
    pub operation: TabletOperation,
    pub alias: TabletAlias,
    /// Target type of a [`TabletOperation::ChangeTabletType`] call.
    pub tablet_type: Option<TabletType>,
}

/// Behavior injected into calls of one operation against one tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The call returns a [`ErrorKind::RemoteCallFailed`] error.
    Fail,
    /// The call never completes.
    Hang,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<TabletCall>,
    faults: HashMap<(TabletOperation, TabletAlias), Fault>,
    stopped: HashSet<TabletAlias>,
}

/// In-memory [`TabletManager`] recording every call it receives.
///
/// When built with [`MemoryTabletManager::with_topology`], successful type changes are
/// written back to the topology.
#[derive(Debug, Clone, Default)]
pub struct MemoryTabletManager {
    inner: Arc<Mutex<Inner>>,
    topology: Option<MemoryTopology>,
}

impl MemoryTabletManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topology(topology: MemoryTopology) -> Self {
        Self {
            inner: Arc::default(),
            topology: Some(topology),
        }
    }

    /// Makes every following `operation` call against `alias` behave according to `fault`.
    pub async fn inject_fault(&self, operation: TabletOperation, alias: TabletAlias, fault: Fault) {
        let mut inner = self.inner.lock().await;
        inner.faults.insert((operation, alias), fault);
    }

    /// Returns all calls received so far, including failed and hanging ones.
    pub async fn calls(&self) -> Vec<TabletCall> {
        let inner = self.inner.lock().await;
        inner.calls.clone()
    }

    /// Returns the calls received for `alias`, in order.
    pub async fn calls_for(&self, alias: &TabletAlias) -> Vec<TabletCall> {
        let inner = self.inner.lock().await;
        inner
            .calls
            .iter()
            .filter(|call| &call.alias == alias)
            .cloned()
            .collect()
    }

    /// Returns `true` if replication on `alias` is currently stopped.
    pub async fn is_replication_stopped(&self, alias: &TabletAlias) -> bool {
        let inner = self.inner.lock().await;
        inner.stopped.contains(alias)
    }

    /// Records the call and resolves the injected fault without holding the lock while hanging.
    async fn begin_call(
        &self,
        operation: TabletOperation,
        alias: &TabletAlias,
        tablet_type: Option<TabletType>,
    ) -> SqlDiffResult<()> {
        let fault = {
            let mut inner = self.inner.lock().await;
            inner.calls.push(TabletCall {
                operation,
                alias: alias.clone(),
                tablet_type,
            });
            inner.faults.get(&(operation, alias.clone())).copied()
        };

        match fault {
            None => Ok(()),
            Some(Fault::Fail) => bail!(
                ErrorKind::RemoteCallFailed,
                "Tablet rejected the call",
                format!("injected failure for {operation} on {alias}")
            ),
            Some(Fault::Hang) => std::future::pending().await,
        }
    }
}

impl TabletManager for MemoryTabletManager {
    async fn stop_replication(&self, tablet: &TabletInfo) -> SqlDiffResult<()> {
        self.begin_call(TabletOperation::StopReplication, &tablet.alias, None)
            .await?;

        let mut inner = self.inner.lock().await;
        inner.stopped.insert(tablet.alias.clone());

        Ok(())
    }

    async fn start_replication(&self, tablet: &TabletInfo) -> SqlDiffResult<()> {
        self.begin_call(TabletOperation::StartReplication, &tablet.alias, None)
            .await?;

        let mut inner = self.inner.lock().await;
        inner.stopped.remove(&tablet.alias);

        Ok(())
    }

    async fn change_tablet_type(
        &self,
        tablet: &TabletInfo,
        tablet_type: TabletType,
    ) -> SqlDiffResult<()> {
        self.begin_call(
            TabletOperation::ChangeTabletType,
            &tablet.alias,
            Some(tablet_type),
        )
        .await?;

        if let Some(topology) = &self.topology {
            topology.set_tablet_type(&tablet.alias, tablet_type).await?;
        }

        Ok(())
    }
}
