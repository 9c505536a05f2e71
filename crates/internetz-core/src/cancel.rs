use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// The sending side of a level-triggered, broadcast cancellation signal.
///
/// No value is ever sent: cancelling drops the only sender, after which
/// every [`CancelToken`] observes a disconnected channel, forever.
#[derive(Debug, Clone)]
pub struct Cancellation {
    sender: Arc<Mutex<Option<Sender<()>>>>,
}

/// Observes a [`Cancellation`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: Receiver<()>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> (Self, CancelToken) {
        let (sender, receiver) = bounded(0);
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            CancelToken { receiver },
        )
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.sender.lock().take();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl CancelToken {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// A channel which becomes ready (disconnected) once cancelled, for use in `select!`.
    #[must_use]
    pub const fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Block for up to `timeout`, returning true if cancelled.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.receiver.recv_timeout(timeout).is_err() && self.is_cancelled()
    }
}
