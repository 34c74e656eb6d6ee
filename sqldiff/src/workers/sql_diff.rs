use sqldiff_config::shared::{SourceSpecConfig, SqlDiffWorkerConfig};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info};

use crate::cleaner::Cleaner;
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::diff::{DiffReport, RowSubsetDiffer};
use crate::error::{ErrorKind, SqlDiffError, SqlDiffResult};
use crate::metrics::register_metrics;
use crate::query::{QueryResultReader, QueryService};
use crate::{bail, sqldiff_error};
use crate::tablet_manager::TabletManager;
use crate::topology::TopologyDirectory;
use crate::types::TabletAlias;
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::status::{SqlDiffWorkerState, SqlDiffWorkerStatus};
use crate::workers::sync::{SyncSettings, synchronize_replication};
use crate::workers::targets::find_target;

/// One side of a diff together with the tablet resolved for it.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    config: SourceSpecConfig,
    alias: Option<TabletAlias>,
}

impl SourceSpec {
    fn new(config: SourceSpecConfig) -> Self {
        Self {
            config,
            alias: None,
        }
    }

    pub fn keyspace(&self) -> &str {
        &self.config.keyspace
    }

    pub fn shard(&self) -> &str {
        &self.config.shard
    }

    pub fn sql(&self) -> &str {
        &self.config.sql
    }

    /// Tablet reserved for this side, set once targets are found.
    pub fn alias(&self) -> Option<&TabletAlias> {
        self.alias.as_ref()
    }

    fn resolved_alias(&self) -> SqlDiffResult<&TabletAlias> {
        self.alias.as_ref().ok_or_else(|| {
            sqldiff_error!(
                ErrorKind::InvalidState,
                "No tablet was resolved for the source",
                format!("{}/{}", self.keyspace(), self.shard())
            )
        })
    }
}

/// Checks that every row of a subset query has a counterpart in a superset query.
///
/// A run reserves one rdonly tablet per side, freezes replication on both, diffs the query
/// results and finally undoes every change made to the tablets, whatever the outcome.
#[derive(Debug)]
pub struct SqlDiffWorker<T, M, Q> {
    config: Arc<SqlDiffWorkerConfig>,
    topology: T,
    tablet_manager: M,
    query_service: Q,
    superset: SourceSpec,
    subset: SourceSpec,
    cleaner: Cleaner,
    status: SqlDiffWorkerStatus,
    shutdown_tx: ShutdownTx,
    shutdown_rx: ShutdownRx,
}

impl<T, M, Q> SqlDiffWorker<T, M, Q>
where
    T: TopologyDirectory,
    M: TabletManager,
    Q: QueryService,
{
    /// Creates a worker after validating `config`.
    pub fn new(
        config: SqlDiffWorkerConfig,
        topology: T,
        tablet_manager: M,
        query_service: Q,
    ) -> SqlDiffResult<Self> {
        config.validate()?;

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let status = SqlDiffWorkerStatus::new(&config.subset.keyspace, &config.subset.shard);

        Ok(Self {
            superset: SourceSpec::new(config.superset.clone()),
            subset: SourceSpec::new(config.subset.clone()),
            config: Arc::new(config),
            topology,
            tablet_manager,
            query_service,
            cleaner: Cleaner::new(),
            status,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn status(&self) -> SqlDiffWorkerStatus {
        self.status.clone()
    }

    pub fn superset(&self) -> &SourceSpec {
        &self.superset
    }

    pub fn subset(&self) -> &SourceSpec {
        &self.subset
    }

    /// Requests the run to stop.
    ///
    /// Can be called any number of times, before, during or after a run. A running worker
    /// notices the request at its next checkpoint, so a remote call in flight completes or
    /// times out first.
    pub fn cancel(&self) {
        if self.shutdown_tx.shutdown() {
            info!("cancellation requested for sql diff worker");
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Runs the worker in place, cleans up and sets the terminal state.
    ///
    /// A cleanup failure is returned only when the run itself succeeded, otherwise it is
    /// logged and the run error is kept.
    ///
    /// A worker runs at most once: later calls fail with [`ErrorKind::InvalidState`] without
    /// touching any tablet or the status.
    pub async fn run_to_completion(&mut self) -> SqlDiffResult<()> {
        let state = self.status.state();
        if !matches!(state, SqlDiffWorkerState::NotStarted) {
            bail!(
                ErrorKind::InvalidState,
                "Worker was already run",
                format!("current state: {state}")
            );
        }

        register_metrics();

        let run_result = self.run().await;

        self.status.set_state(SqlDiffWorkerState::CleaningUp);
        let cleanup_result = self
            .cleaner
            .clean_up(
                &self.topology,
                &self.tablet_manager,
                self.config.cleanup_action_timeout(),
            )
            .await;

        let result = match (run_result, cleanup_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(cleanup_err)) => Err(cleanup_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                error!(error = %cleanup_err, "cleanup failed after the run failed");
                Err(err)
            }
        };

        match &result {
            Ok(()) => {
                info!("sql diff worker completed successfully");
                self.status.set_state(SqlDiffWorkerState::Done);
            }
            Err(err) => {
                error!(error = %err, "sql diff worker failed");
                self.status.set_state(SqlDiffWorkerState::Error(err.clone()));
            }
        }

        result
    }

    async fn run(&mut self) -> SqlDiffResult<()> {
        self.shutdown_rx.check_interrupted()?;

        self.status.set_state(SqlDiffWorkerState::FindingTargets);
        self.find_targets().await?;
        self.shutdown_rx.check_interrupted()?;

        self.status
            .set_state(SqlDiffWorkerState::SynchronizingReplication);
        if let Err(err) = self.synchronize_replication().await {
            if self.shutdown_rx.is_shutdown() && err.kind() != ErrorKind::Interrupted {
                return Err(sqldiff_error!(
                    ErrorKind::Interrupted,
                    "Worker was interrupted",
                    format!("while synchronizing replication: {err}")
                ));
            }

            return Err(err);
        }
        self.shutdown_rx.check_interrupted()?;

        self.status.set_state(SqlDiffWorkerState::Running);
        let report = self.diff().await?;
        self.status.set_report(report);
        self.shutdown_rx.check_interrupted()?;

        Ok(())
    }

    async fn find_targets(&mut self) -> SqlDiffResult<()> {
        let remote_call_timeout = self.config.remote_call_timeout();

        for source in [&mut self.superset, &mut self.subset] {
            if let Some(resolved) = &source.alias {
                bail!(
                    ErrorKind::InvalidState,
                    "A tablet was already resolved for the source",
                    format!("{}/{} uses {resolved}", source.keyspace(), source.shard())
                );
            }

            let alias = find_target(
                &self.topology,
                &self.tablet_manager,
                &self.cleaner,
                &self.config.cell,
                &source.config.keyspace,
                &source.config.shard,
                remote_call_timeout,
            )
            .await?;
            source.alias = Some(alias);
        }

        Ok(())
    }

    async fn synchronize_replication(&mut self) -> SqlDiffResult<()> {
        let subset = self.subset.resolved_alias()?;
        let superset = self.superset.resolved_alias()?;
        let settings = SyncSettings {
            remote_call_timeout: self.config.remote_call_timeout(),
            settle_interval: self.config.settle_interval(),
        };

        synchronize_replication(
            &self.topology,
            &self.tablet_manager,
            &self.cleaner,
            subset,
            superset,
            settings,
            &mut self.shutdown_rx,
        )
        .await
    }

    async fn diff(&self) -> SqlDiffResult<DiffReport> {
        let superset_alias = self.superset.resolved_alias()?;
        let subset_alias = self.subset.resolved_alias()?;

        let mut superset = self
            .query_service
            .open_query_stream(superset_alias, self.superset.sql())
            .await
            .map_err(|err| err.with_context(format!("superset on {superset_alias}")))?;
        let subset = match self
            .query_service
            .open_query_stream(subset_alias, self.subset.sql())
            .await
        {
            Ok(subset) => subset,
            Err(err) => {
                superset.close();
                return Err(err.with_context(format!("subset on {subset_alias}")));
            }
        };

        RowSubsetDiffer::try_new(superset, subset, self.config.key_column_count)?
            .with_max_recorded_discrepancies(self.config.max_recorded_discrepancies)
            .with_shutdown(self.shutdown_rx.clone())
            .run()
            .await
    }
}

impl<T, M, Q> Worker<SqlDiffWorkerHandle, SqlDiffWorkerStatus> for SqlDiffWorker<T, M, Q>
where
    T: TopologyDirectory + Send + Sync + 'static,
    M: TabletManager + Send + Sync + 'static,
    Q: QueryService + Send + Sync + 'static,
{
    type Error = SqlDiffError;

    async fn start(mut self) -> SqlDiffResult<SqlDiffWorkerHandle> {
        info!(
            superset = %format!("{}/{}", self.superset.keyspace(), self.superset.shard()),
            subset = %format!("{}/{}", self.subset.keyspace(), self.subset.shard()),
            "starting sql diff worker"
        );

        let status = self.status.clone();
        let shutdown_tx = self.shutdown_tx.clone();

        let span = tracing::info_span!(
            "sql_diff_worker",
            keyspace = %self.subset.keyspace(),
            shard = %self.subset.shard()
        );
        let worker = async move { self.run_to_completion().await }.instrument(span);
        let handle = tokio::spawn(worker);

        Ok(SqlDiffWorkerHandle {
            status,
            shutdown_tx,
            handle: Some(handle),
        })
    }
}

/// Handle to a [`SqlDiffWorker`] running on the tokio runtime.
#[derive(Debug)]
pub struct SqlDiffWorkerHandle {
    status: SqlDiffWorkerStatus,
    shutdown_tx: ShutdownTx,
    handle: Option<JoinHandle<SqlDiffResult<()>>>,
}

impl SqlDiffWorkerHandle {
    pub fn status(&self) -> SqlDiffWorkerStatus {
        self.status.clone()
    }

    /// Requests the worker to stop, see [`SqlDiffWorker::cancel`].
    pub fn cancel(&self) {
        if self.shutdown_tx.shutdown() {
            info!("cancellation requested for sql diff worker");
        }
    }

    /// Returns the error the worker ended with, if it already ended with one.
    pub fn error(&self) -> Option<SqlDiffError> {
        self.status.error()
    }
}

impl WorkerHandle<SqlDiffWorkerStatus> for SqlDiffWorkerHandle {
    fn state(&self) -> SqlDiffWorkerStatus {
        self.status.clone()
    }

    async fn wait(mut self) -> SqlDiffResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match handle.await {
            Ok(result) => result,
            Err(err) => {
                let err = SqlDiffError::from(err);
                error!(error = %err, "sql diff worker task did not complete");
                self.status.set_state(SqlDiffWorkerState::Error(err.clone()));

                Err(err)
            }
        }
    }
}
