use sqldiff_config::shared::{SourceSpecConfig, SqlDiffWorkerConfig};

use crate::query::memory::{MemoryQueryService, MemoryTable};
use crate::tablet_manager::memory::MemoryTabletManager;
use crate::topology::memory::MemoryTopology;
use crate::types::{TabletAlias, TabletInfo, TabletType};
use crate::workers::sql_diff::SqlDiffWorker;

pub const TEST_CELL: &str = "zone1";
pub const SUPERSET_KEYSPACE: &str = "main";
pub const SUBSET_KEYSPACE: &str = "lookup";
pub const TEST_SHARD: &str = "0";

pub type MemorySqlDiffWorker =
    SqlDiffWorker<MemoryTopology, MemoryTabletManager, MemoryQueryService>;

/// A cell with one rdonly tablet per side plus a master for each keyspace.
#[derive(Debug, Clone)]
pub struct TestCluster {
    pub topology: MemoryTopology,
    pub tablet_manager: MemoryTabletManager,
    pub query_service: MemoryQueryService,
    pub superset_alias: TabletAlias,
    pub subset_alias: TabletAlias,
}

impl TestCluster {
    pub async fn new() -> Self {
        let topology = MemoryTopology::new();
        let superset_alias = TabletAlias::new(TEST_CELL, 101);
        let subset_alias = TabletAlias::new(TEST_CELL, 201);

        for (uid, keyspace, tablet_type) in [
            (100, SUPERSET_KEYSPACE, TabletType::Master),
            (101, SUPERSET_KEYSPACE, TabletType::Rdonly),
            (200, SUBSET_KEYSPACE, TabletType::Master),
            (201, SUBSET_KEYSPACE, TabletType::Rdonly),
        ] {
            topology
                .add_tablet(TabletInfo {
                    alias: TabletAlias::new(TEST_CELL, uid),
                    keyspace: keyspace.to_string(),
                    shard: TEST_SHARD.to_string(),
                    tablet_type,
                    addr: format!("localhost:{}", 15000 + uid),
                })
                .await;
        }

        Self {
            tablet_manager: MemoryTabletManager::with_topology(topology.clone()),
            topology,
            query_service: MemoryQueryService::new(),
            superset_alias,
            subset_alias,
        }
    }

    pub async fn set_superset_table(&self, table: MemoryTable) {
        self.query_service
            .set_table(self.superset_alias.clone(), table)
            .await;
    }

    pub async fn set_subset_table(&self, table: MemoryTable) {
        self.query_service
            .set_table(self.subset_alias.clone(), table)
            .await;
    }

    pub fn create_worker(&self, config: SqlDiffWorkerConfig) -> MemorySqlDiffWorker {
        SqlDiffWorker::new(
            config,
            self.topology.clone(),
            self.tablet_manager.clone(),
            self.query_service.clone(),
        )
        .expect("test worker configuration is valid")
    }
}

/// Worker configuration targeting [`TestCluster`] with short waits.
pub fn test_worker_config() -> SqlDiffWorkerConfig {
    let mut config = SqlDiffWorkerConfig::new(
        TEST_CELL,
        SourceSpecConfig {
            keyspace: SUPERSET_KEYSPACE.to_string(),
            shard: TEST_SHARD.to_string(),
            sql: "SELECT id, name FROM users ORDER BY id".to_string(),
        },
        SourceSpecConfig {
            keyspace: SUBSET_KEYSPACE.to_string(),
            shard: TEST_SHARD.to_string(),
            sql: "SELECT id, name FROM users_lookup ORDER BY id".to_string(),
        },
    );
    config.settle_interval_ms = 10;
    config.remote_call_timeout_ms = 200;
    config.cleanup_action_timeout_ms = 200;

    config
}
