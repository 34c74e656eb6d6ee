use crate::bail;
use crate::concurrency::signal::{SignalRx, SignalTx, create_signal};
use crate::error::{ErrorKind, SqlDiffResult};

/// Sends the cancellation signal to a worker.
///
/// Cancelling is idempotent and never fails: the signal is sticky, so receivers created or
/// polled after the first call still observe it, and later calls are no-ops.
#[derive(Debug, Clone)]
pub struct ShutdownTx(SignalTx);

impl ShutdownTx {
    /// Signals shutdown to all receivers.
    ///
    /// Returns `true` if this call was the one flipping the signal.
    pub fn shutdown(&self) -> bool {
        !self.0.send_replace(true)
    }

    /// Returns `true` once shutdown has been signalled.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Observes the cancellation signal of a worker.
///
/// Checking the signal never blocks; [`ShutdownRx::wait`] is meant to be raced against
/// blocking work in a `tokio::select!`.
#[derive(Debug, Clone)]
pub struct ShutdownRx(SignalRx);

impl ShutdownRx {
    /// Returns `true` once shutdown has been signalled.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Fails with [`ErrorKind::Interrupted`] once shutdown has been signalled.
    pub fn check_interrupted(&self) -> SqlDiffResult<()> {
        if self.is_shutdown() {
            bail!(ErrorKind::Interrupted, "Worker was interrupted");
        }

        Ok(())
    }

    /// Resolves once shutdown has been signalled.
    ///
    /// Never resolves if every [`ShutdownTx`] is dropped without signalling.
    pub async fn wait(&mut self) {
        if self.0.wait_for(|shutdown| *shutdown).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Outcome of an operation that can be cut short by shutdown.
pub enum ShutdownResult<T, I> {
    Ok(T),
    Shutdown(I),
}

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = create_signal();
    (ShutdownTx(tx), ShutdownRx(rx))
}
