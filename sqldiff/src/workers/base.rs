use std::future::Future;

use crate::error::SqlDiffResult;

/// A unit of work that runs in the background once started.
///
/// `H` is the handle returned by [`Worker::start`] and `S` the observable state exposed by that
/// handle.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    type Error;

    /// Spawns the worker and hands back a handle to control it.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Control side of a started [`Worker`].
pub trait WorkerHandle<S> {
    /// Returns the observable state of the worker.
    ///
    /// The state is shared with the worker: it keeps tracking its progress and stays readable
    /// after the worker has finished.
    fn state(&self) -> S;

    /// Waits for the worker to finish and returns its outcome.
    fn wait(self) -> impl Future<Output = SqlDiffResult<()>> + Send;
}
