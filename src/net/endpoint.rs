//! Listening endpoints and the process-wide tracked set.
//!
//! # Responsibilities
//! - Represent a live listening endpoint (address, owning service)
//! - Close it: stop accepting, drain connections, wait for completion
//! - Track every endpoint started in the process for coordinated shutdown
//!
//! # Design Decisions
//! - A handle is two latches: `stop` (requested) and `closed` (done); the
//!   accept task holds a guard that trips `closed` however it ends
//! - `close_all` drains the set under one lock, so endpoints added afterwards
//!   belong to the next shutdown

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::lifecycle::shutdown::Shutdown;

static ENDPOINT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct EndpointInner {
    id: u64,
    service: String,
    local_addr: SocketAddr,
    stop: Shutdown,
    closed: Shutdown,
}

/// Handle to a live listening endpoint. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    inner: Arc<EndpointInner>,
}

impl EndpointHandle {
    pub fn new(service: impl Into<String>, local_addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                id: ENDPOINT_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                service: service.into(),
                local_addr,
                stop: Shutdown::new(),
                closed: Shutdown::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    /// Ask the endpoint to stop accepting. Does not wait.
    pub fn request_stop(&self) {
        self.inner.stop.trigger();
    }

    /// Resolves when a stop has been requested.
    pub async fn stop_requested(&self) {
        self.inner.stop.triggered().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_triggered()
    }

    /// Block until the endpoint has closed or `timeout` elapses.
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        self.inner.closed.wait_timeout(timeout)
    }

    /// Stop the endpoint and wait for it to close.
    pub fn close(&self, timeout: Duration) -> bool {
        self.request_stop();
        self.wait_closed(timeout)
    }

    /// Guard held by the accept task; marks the endpoint closed on drop.
    pub(crate) fn closed_guard(&self) -> ClosedGuard {
        ClosedGuard {
            endpoint: self.clone(),
        }
    }
}

impl PartialEq for EndpointHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EndpointHandle {}

pub(crate) struct ClosedGuard {
    endpoint: EndpointHandle,
}

impl Drop for ClosedGuard {
    fn drop(&mut self) {
        self.endpoint.inner.closed.trigger();
    }
}

/// Live endpoints of every service sharing a process context.
#[derive(Debug, Default)]
pub struct TrackedEndpointSet {
    endpoints: Mutex<Vec<EndpointHandle>>,
}

impl TrackedEndpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, endpoint: EndpointHandle) {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(endpoint);
    }

    pub fn len(&self) -> usize {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<EndpointHandle> {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove every endpoint, stop them all, then wait for each to close.
    ///
    /// Returns the closed endpoints.
    pub fn close_all(&self, timeout: Duration) -> Vec<EndpointHandle> {
        let endpoints = std::mem::take(
            &mut *self
                .endpoints
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for endpoint in &endpoints {
            endpoint.request_stop();
        }
        for endpoint in &endpoints {
            if !endpoint.wait_closed(timeout) {
                tracing::warn!(
                    endpoint = %endpoint.local_addr(),
                    service = %endpoint.service(),
                    "Endpoint did not close within timeout"
                );
            }
        }
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(port: u16) -> EndpointHandle {
        EndpointHandle::new("test", SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn close_all_drains_set_and_stops_every_endpoint() {
        let set = TrackedEndpointSet::new();
        let a = endpoint(1);
        let b = endpoint(2);
        let guards = vec![a.closed_guard(), b.closed_guard()];
        set.add(a.clone());
        set.add(b.clone());

        // Simulate accept tasks that exit once stopped.
        let tasks: Vec<_> = guards
            .into_iter()
            .zip([a.clone(), b.clone()])
            .map(|(guard, ep)| {
                std::thread::spawn(move || {
                    ep.inner.stop.wait();
                    drop(guard);
                })
            })
            .collect();

        let closed = set.close_all(Duration::from_secs(5));
        assert_eq!(closed, vec![a.clone(), b.clone()]);
        assert!(set.is_empty());
        assert!(a.is_closed() && b.is_closed());
        for task in tasks {
            task.join().unwrap();
        }
    }

    #[test]
    fn close_times_out_without_accept_task() {
        let ep = endpoint(3);
        assert!(!ep.close(Duration::from_millis(10)));
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = endpoint(4);
        assert_eq!(a, a.clone());
        assert_ne!(a, endpoint(4));
    }
}
