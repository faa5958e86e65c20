//! Listens for the session-wide shutdown signal.
//!
//! The signal travels over a `broadcast::Receiver`; only one value is ever
//! sent on it. Once a value has gone out, the session is shutting down and
//! every task holding a `Shutdown` should wind itself up.
//!
//! [`Shutdown`] waits for the signal and remembers whether it has already
//! fired, the same pattern the teacher uses to let both the reader task and
//! any caller loop check shutdown status without racing each other.
use tokio::sync::broadcast;

pub(crate) struct Shutdown {
    /// `true` once the shutdown signal has been observed.
    shutdown: bool,

    /// The receiving half of the broadcast channel.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub(crate) fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Has the shutdown signal been received?
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Wait for the shutdown signal, if it hasn't arrived yet.
    pub(crate) async fn recv(&mut self) {
        if self.shutdown {
            return;
        }

        // Only one value is ever sent, so a lag error can't happen here.
        let _ = self.notify.recv().await;

        self.shutdown = true;
    }
}
