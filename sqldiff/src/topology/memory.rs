use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SqlDiffResult};
use crate::topology::TopologyDirectory;
use crate::types::{TabletAlias, TabletInfo, TabletType};

#[derive(Debug, Default)]
struct Inner {
    tablets: BTreeMap<TabletAlias, TabletInfo>,
}

/// In-memory [`TopologyDirectory`].
///
/// Tablets are kept ordered by alias, so [`TopologyDirectory::find_tablet`] always resolves the
/// matching tablet with the smallest alias.
#[derive(Debug, Clone, Default)]
pub struct MemoryTopology {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tablet.
    pub async fn add_tablet(&self, tablet: TabletInfo) {
        let mut inner = self.inner.lock().await;
        inner.tablets.insert(tablet.alias.clone(), tablet);
    }

    /// Changes the type of a registered tablet.
    pub async fn set_tablet_type(
        &self,
        alias: &TabletAlias,
        tablet_type: TabletType,
    ) -> SqlDiffResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(tablet) = inner.tablets.get_mut(alias) else {
            bail!(
                ErrorKind::ReplicaNotFound,
                "Tablet is not registered in the topology",
                alias
            );
        };

        tablet.tablet_type = tablet_type;

        Ok(())
    }

    /// Returns the current type of a tablet, if registered.
    pub async fn tablet_type(&self, alias: &TabletAlias) -> Option<TabletType> {
        let inner = self.inner.lock().await;
        inner.tablets.get(alias).map(|tablet| tablet.tablet_type)
    }
}

impl TopologyDirectory for MemoryTopology {
    async fn find_tablet(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> SqlDiffResult<TabletAlias> {
        let inner = self.inner.lock().await;
        let found = inner.tablets.values().find(|tablet| {
            tablet.alias.cell == cell
                && tablet.keyspace == keyspace
                && tablet.shard == shard
                && tablet.tablet_type == tablet_type
        });

        match found {
            Some(tablet) => Ok(tablet.alias.clone()),
            None => bail!(
                ErrorKind::ReplicaNotFound,
                "No eligible tablet found",
                format!("no {tablet_type} tablet for {keyspace}/{shard} in cell {cell}")
            ),
        }
    }

    async fn get_tablet(&self, alias: &TabletAlias) -> SqlDiffResult<TabletInfo> {
        let inner = self.inner.lock().await;
        match inner.tablets.get(alias) {
            Some(tablet) => Ok(tablet.clone()),
            None => bail!(
                ErrorKind::ReplicaNotFound,
                "Tablet is not registered in the topology",
                alias
            ),
        }
    }
}
