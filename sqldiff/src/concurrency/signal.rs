use tokio::sync::watch;

/// Sending side of a sticky one-shot signal.
pub type SignalTx = watch::Sender<bool>;

/// Receiving side of a sticky one-shot signal.
pub type SignalRx = watch::Receiver<bool>;

/// Creates a new pair of [`SignalTx`] and [`SignalRx`], initially not signalled.
pub fn create_signal() -> (SignalTx, SignalRx) {
    watch::channel(false)
}
