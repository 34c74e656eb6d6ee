use metrics::counter;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{ErrorKind, SqlDiffResult};
use crate::metrics::{OPERATION_LABEL, OUTCOME_LABEL, SQLDIFF_REMOTE_CALLS_TOTAL};
use crate::sqldiff_error;
use crate::types::{TabletInfo, TabletType};

/// Remote operations a [`TabletManager`] can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabletOperation {
    StopReplication,
    StartReplication,
    ChangeTabletType,
}

impl TabletOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabletOperation::StopReplication => "stop_replication",
            TabletOperation::StartReplication => "start_replication",
            TabletOperation::ChangeTabletType => "change_tablet_type",
        }
    }
}

impl fmt::Display for TabletOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends replication control commands to tablets.
///
/// Implementations do not bound the duration of a call, callers wrap them with
/// [`call_with_timeout`].
pub trait TabletManager {
    /// Stops applying replication on `tablet`, freezing its data.
    fn stop_replication(&self, tablet: &TabletInfo)
    -> impl Future<Output = SqlDiffResult<()>> + Send;

    /// Resumes replication on `tablet`.
    fn start_replication(
        &self,
        tablet: &TabletInfo,
    ) -> impl Future<Output = SqlDiffResult<()>> + Send;

    /// Changes the serving type of `tablet`.
    fn change_tablet_type(
        &self,
        tablet: &TabletInfo,
        tablet_type: TabletType,
    ) -> impl Future<Output = SqlDiffResult<()>> + Send;
}

/// Awaits a remote call for at most `timeout`.
///
/// Elapsed calls fail with [`ErrorKind::RemoteCallTimeout`], failed calls keep their error
/// with the operation and tablet prepended to it.
pub async fn call_with_timeout<F>(
    operation: TabletOperation,
    tablet: &TabletInfo,
    timeout: Duration,
    call: F,
) -> SqlDiffResult<()>
where
    F: Future<Output = SqlDiffResult<()>>,
{
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.with_context(format!("{operation} on {}", tablet.alias))),
        Err(_) => Err(sqldiff_error!(
            ErrorKind::RemoteCallTimeout,
            "Remote call did not complete in time",
            format!(
                "{operation} on {} exceeded {}ms",
                tablet.alias,
                timeout.as_millis()
            )
        )),
    };

    let outcome = match &result {
        Ok(()) => "success",
        Err(err) if err.kind() == ErrorKind::RemoteCallTimeout => "timeout",
        Err(_) => "failure",
    };
    counter!(
        SQLDIFF_REMOTE_CALLS_TOTAL,
        OPERATION_LABEL => operation.as_str(),
        OUTCOME_LABEL => outcome
    )
    .increment(1);

    if let Err(err) = &result {
        warn!(%operation, tablet = %tablet.alias, error = %err, "remote call failed");
    }

    result
}
