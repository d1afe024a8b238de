//! Cooperative cancellation of superseded requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared flag a request checks to learn it has been superseded.
///
/// Clones observe the same state. Cancelling is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Hands out one token per request, cancelling the previous one.
///
/// A caller re-running analytics on changed filters begins a new request
/// through the session; the older in-flight computation then resolves to
/// `AnalyticsError::Cancelled` instead of racing the newer result.
#[derive(Debug, Default)]
pub struct AnalyticsSession {
    current: Mutex<CancellationToken>,
}

impl AnalyticsSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the in-flight request, if any, and returns a fresh token.
    pub fn begin(&self) -> CancellationToken {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !current.is_cancelled() {
            debug!("Superseding in-flight analytics request");
        }
        current.cancel();
        *current = CancellationToken::new();
        current.clone()
    }

    /// Cancels the in-flight request without starting another.
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cancel();
    }
}
