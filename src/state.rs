//! Shared state: event counters and the process shutdown signal.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Subscriber and follower totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Subscribers seen since the daemon started.
    pub subscribers: u64,
    /// Followers seen since the daemon started.
    pub followers: u64,
}

/// Increment-only counters shared between the event listener and the
/// status display.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    inner: Arc<Mutex<Counts>>,
}

impl Counters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` subscribers in one step. Returns the new total.
    pub fn add_subscribers(&self, n: u64) -> u64 {
        let mut counts = self.inner.lock();
        counts.subscribers = counts.subscribers.saturating_add(n);
        counts.subscribers
    }

    /// Add one follower. Returns the new total.
    pub fn add_follower(&self) -> u64 {
        let mut counts = self.inner.lock();
        counts.followers = counts.followers.saturating_add(1);
        counts.followers
    }

    /// Current subscriber total.
    pub fn subscribers(&self) -> u64 {
        self.inner.lock().subscribers
    }

    /// Copy both totals.
    pub fn snapshot(&self) -> Counts {
        *self.inner.lock()
    }
}

/// Process-wide cooperative shutdown flag.
///
/// Every long-running loop checks it at the top of each iteration.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown was requested.
    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}
