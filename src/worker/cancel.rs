//! Shared, write-once cancellation signal
//!
//! One token is cloned into every worker. `cancel` flips an atomic flag and
//! drops the only sender of a wake-up channel; every thread blocked in
//! `wait` sees the disconnect immediately, so a worker sleeping out its rate
//! delay stops without finishing the sleep.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a `wait` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full interval passed
    Elapsed,
    /// Cancellation fired before or during the wait
    Cancelled,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

/// Cloneable handle to one cancellation signal
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wake_tx: Mutex::new(Some(tx)),
                wake_rx: rx,
            }),
        }
    }

    /// Signal cancellation; later calls are no-ops
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let mut tx = self
            .inner
            .wake_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tx.take();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Block for `timeout` unless cancellation fires first
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        if self.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        match self.inner.wake_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => WaitOutcome::Elapsed,
            // nothing is ever sent; any other result means the sender is gone
            Err(RecvTimeoutError::Disconnected) | Ok(()) => WaitOutcome::Cancelled,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
