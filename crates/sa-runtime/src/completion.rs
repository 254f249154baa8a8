use std::thread;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use futures_lite::future;

use crate::error::{Result, RuntimeError};

/// Outcome a device reports for one enqueued compute.
pub type DeviceOutcome = std::result::Result<(), String>;

/// Shared flag a host raises to abandon a pending wait.
///
/// Raising the flag closes a channel that nothing ever sends on, which wakes
/// every waiter blocked on it.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl CancelFlag {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::bounded(1);
        Self { tx, rx }
    }

    pub fn cancel(&self) {
        self.tx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the flag is raised.
    async fn raised(&self) {
        let _ = self.rx.recv().await;
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// How long, and under which cancel flag, a host waits for completion.
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Give up with [`RuntimeError::Timeout`] after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Give up with [`RuntimeError::Cancelled`] once this flag is raised.
    pub cancel: Option<CancelFlag>,
}

impl WaitOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// Device side of a completion: consumed when the compute finishes.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: Sender<DeviceOutcome>,
}

impl CompletionSignal {
    pub fn complete(self, outcome: DeviceOutcome) {
        // The host may have stopped waiting; a closed channel is fine.
        let _ = self.tx.send_blocking(outcome);
    }
}

/// Host side of a completion, returned by `enqueue_compute`.
#[derive(Debug)]
pub struct CompletionToken {
    rx: Receiver<DeviceOutcome>,
}

/// Create a connected signal/token pair.
pub fn completion_pair() -> (CompletionSignal, CompletionToken) {
    let (tx, rx) = async_channel::bounded(1);
    (CompletionSignal { tx }, CompletionToken { rx })
}

/// What ended a wait.
enum Wake {
    Finished(DeviceOutcome),
    Dropped,
    Cancelled,
    Expired(Duration),
}

impl CompletionToken {
    /// Block until the device signals, the timeout elapses or the cancel
    /// flag is raised, whichever comes first.
    ///
    /// A flag raised before the call wins over an outcome already sent.
    /// Giving up does not stop the device; its eventual signal is dropped.
    pub fn wait(self, options: &WaitOptions) -> Result<()> {
        if options.cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        let deadline = options
            .timeout
            .map(|timeout| deadline_timer(timeout).map(|rx| (rx, timeout)))
            .transpose()?;

        let finished = async {
            match self.rx.recv().await {
                Ok(outcome) => Wake::Finished(outcome),
                Err(_) => Wake::Dropped,
            }
        };
        let cancelled = async {
            match &options.cancel {
                Some(flag) => {
                    flag.raised().await;
                    Wake::Cancelled
                }
                None => future::pending().await,
            }
        };
        let expired = async {
            match &deadline {
                Some((rx, timeout)) => {
                    let _ = rx.recv().await;
                    Wake::Expired(*timeout)
                }
                None => future::pending().await,
            }
        };

        match future::block_on(future::or(finished, future::or(cancelled, expired))) {
            Wake::Finished(Ok(())) => Ok(()),
            Wake::Finished(Err(msg)) => Err(RuntimeError::ComputeFailure(msg)),
            Wake::Dropped => Err(RuntimeError::ComputeFailure(
                "device dropped the completion signal".to_string(),
            )),
            Wake::Cancelled => Err(RuntimeError::Cancelled),
            Wake::Expired(timeout) => Err(RuntimeError::Timeout(timeout)),
        }
    }
}

/// A receiver whose channel closes once `timeout` has elapsed.
fn deadline_timer(timeout: Duration) -> Result<Receiver<()>> {
    let (tx, rx) = async_channel::bounded::<()>(1);
    thread::Builder::new()
        .name("wait-deadline".to_string())
        .spawn(move || {
            thread::sleep(timeout);
            tx.close();
        })?;
    Ok(rx)
}
