//! Handler dispatch strategy.
//!
//! # Responsibilities
//! - Run pipeline work inline on the I/O thread, or
//! - Hand it to the ordered executor pool and await the result
//!
//! # Design Decisions
//! - Inline dispatch has no indirection at all: the closure runs in the
//!   connection task's poll, on the I/O worker serving that connection
//! - Pooled dispatch keys work by connection, so one connection's requests
//!   complete dispatch in arrival order

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::concurrency::ordered::OrderedExecutor;
use crate::error::DispatchError;
use crate::net::connection::ConnectionId;
use crate::pipeline::request::panic_message;

#[derive(Clone, Debug)]
pub enum DispatchStrategy {
    Inline,
    Pooled(Arc<OrderedExecutor>),
}

impl DispatchStrategy {
    pub async fn dispatch<F, T>(&self, key: ConnectionId, task: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self {
            DispatchStrategy::Inline => catch_unwind(AssertUnwindSafe(task)).map_err(|panic| {
                tracing::error!(
                    connection_id = %key,
                    panic = %panic_message(panic.as_ref()),
                    "Inline task panicked"
                );
                DispatchError::Canceled
            }),
            DispatchStrategy::Pooled(pool) => {
                let (tx, rx) = oneshot::channel();
                pool.execute(
                    key,
                    Box::new(move || {
                        let _ = tx.send(task());
                    }),
                )?;
                rx.await.map_err(|_| DispatchError::Canceled)
            }
        }
    }

    /// Drop per-connection state once the connection has closed.
    pub fn release(&self, key: ConnectionId) {
        if let DispatchStrategy::Pooled(pool) = self {
            pool.release(key);
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, DispatchStrategy::Inline)
    }

    pub fn executor(&self) -> Option<&Arc<OrderedExecutor>> {
        match self {
            DispatchStrategy::Inline => None,
            DispatchStrategy::Pooled(pool) => Some(pool),
        }
    }
}
