//! Ordered executor pool.
//!
//! # Responsibilities
//! - Run blocking handler work on a fixed set of dedicated OS threads
//! - Keep tasks submitted under the same key (connection) in strict FIFO order
//! - Let tasks of different keys run concurrently
//!
//! # Design Decisions
//! - One serial queue per key; a queue is handed to the shared channel only
//!   when it goes from idle to busy, so at most one worker drains it at a time
//! - The `scheduled` flag is flipped under the queue lock on both sides, so a
//!   task pushed while a worker finishes draining is never stranded
//! - A panicking task is logged and dropped; the worker keeps running

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;

use crate::error::DispatchError;
use crate::net::connection::ConnectionId;
use crate::pipeline::request::panic_message;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct SerialQueue {
    key: ConnectionId,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Job>,
    scheduled: bool,
}

impl SerialQueue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct OrderedExecutor {
    name: String,
    size: usize,
    sender: Mutex<Option<Sender<Arc<SerialQueue>>>>,
    queues: DashMap<ConnectionId, Arc<SerialQueue>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    exited: Receiver<()>,
}

impl OrderedExecutor {
    /// Start `size` worker threads named `{name}-executor-{n}`.
    pub fn new(name: &str, size: usize) -> Result<Self, DispatchError> {
        let (sender, receiver) = channel::unbounded::<Arc<SerialQueue>>();
        let (exit_tx, exit_rx) = channel::unbounded::<()>();

        let mut workers = Vec::with_capacity(size);
        for n in 0..size {
            let receiver = receiver.clone();
            let exit_tx = exit_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-executor-{}", name, n))
                .spawn(move || {
                    for queue in receiver.iter() {
                        drain(&queue);
                    }
                    let _ = exit_tx.send(());
                })
                .map_err(DispatchError::Spawn)?;
            workers.push(handle);
        }

        tracing::debug!(executor = %name, threads = size, "Executor pool started");

        Ok(Self {
            name: name.to_string(),
            size,
            sender: Mutex::new(Some(sender)),
            queues: DashMap::new(),
            workers: Mutex::new(workers),
            exited: exit_rx,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `job` behind every earlier job submitted under `key`.
    pub fn execute(&self, key: ConnectionId, job: Job) -> Result<(), DispatchError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DispatchError::Closed)?;

        let queue = self
            .queues
            .entry(key)
            .or_insert_with(|| {
                Arc::new(SerialQueue {
                    key,
                    state: Mutex::new(QueueState::default()),
                })
            })
            .clone();

        let schedule = {
            let mut state = queue.lock();
            state.tasks.push_back(job);
            !std::mem::replace(&mut state.scheduled, true)
        };

        if schedule {
            sender.send(queue).map_err(|_| DispatchError::Closed)?;
        }
        Ok(())
    }

    /// Forget the queue for a closed connection. Pending jobs still run.
    pub fn release(&self, key: ConnectionId) {
        self.queues.remove(&key);
    }

    /// Number of connections with a live queue.
    pub fn active_keys(&self) -> usize {
        self.queues.len()
    }

    /// Stop accepting work, let queued work finish, and join the workers.
    ///
    /// Workers still busy after `timeout` are detached. Calling again is a no-op.
    pub fn shutdown(&self, timeout: Duration) {
        let Some(sender) = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        drop(sender);

        let workers =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let deadline = Instant::now() + timeout;
        let mut exited = 0;
        while exited < workers.len() {
            match self.exited.recv_deadline(deadline) {
                Ok(()) => exited += 1,
                Err(_) => break,
            }
        }

        if exited < workers.len() {
            tracing::warn!(
                executor = %self.name,
                busy = workers.len() - exited,
                "Executor threads still busy at shutdown, detaching"
            );
            return;
        }
        for handle in workers {
            let _ = handle.join();
        }
        self.queues.clear();
        tracing::debug!(executor = %self.name, "Executor pool released");
    }
}

fn drain(queue: &SerialQueue) {
    loop {
        let job = {
            let mut state = queue.lock();
            match state.tasks.pop_front() {
                Some(job) => job,
                None => {
                    state.scheduled = false;
                    return;
                }
            }
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
            tracing::error!(
                connection_id = %queue.key,
                panic = %panic_message(panic.as_ref()),
                "Executor task panicked"
            );
        }
    }
}

impl std::fmt::Debug for OrderedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedExecutor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("active_keys", &self.queues.len())
            .finish()
    }
}
