//! Shutdown coordination.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

/// One-shot latch that can be awaited from async tasks or blocked on from
/// plain threads.
///
/// Once triggered it stays triggered; every waiter, present or future, is
/// released immediately.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    state: Mutex<bool>,
    cvar: Condvar,
}

impl Shutdown {
    /// Create a new, untriggered latch.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
            state: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    /// Trigger the latch. Returns false if it was already triggered.
    pub fn trigger(&self) -> bool {
        let mut triggered = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *triggered {
            return false;
        }
        *triggered = true;
        self.cvar.notify_all();
        drop(triggered);
        self.tx.send_replace(true);
        true
    }

    pub fn is_triggered(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to the latch from async code.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve once the latch is triggered.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only fails if it is dropped.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Block the calling thread until triggered. Must not be called from
    /// inside an async runtime worker.
    pub fn wait(&self) {
        let mut triggered = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while !*triggered {
            triggered = self
                .cvar
                .wait(triggered)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until triggered or `timeout` elapses. Returns true if triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let triggered = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (triggered, _) = self
            .cvar
            .wait_timeout_while(triggered, timeout, |t| !*t)
            .unwrap_or_else(PoisonError::into_inner);
        *triggered
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn trigger_releases_blocked_thread() {
        let latch = Arc::new(Shutdown::new());
        let waiter = {
            let latch = latch.clone();
            std::thread::spawn(move || latch.wait())
        };

        assert!(latch.trigger());
        assert!(!latch.trigger());
        waiter.join().unwrap();
        assert!(latch.is_triggered());
    }

    #[test]
    fn wait_timeout_expires_when_untriggered() {
        let latch = Shutdown::new();
        assert!(!latch.wait_timeout(Duration::from_millis(20)));
        latch.trigger();
        assert!(latch.wait_timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn async_waiters_see_earlier_trigger() {
        let latch = Arc::new(Shutdown::new());
        latch.trigger();
        tokio::time::timeout(Duration::from_secs(1), latch.triggered())
            .await
            .unwrap();

        let mut rx = latch.subscribe();
        assert!(*rx.borrow_and_update());
    }
}
