//! Two-tier concurrency.
//!
//! # Data Flow
//! ```text
//! ServerSettings (io_thread_count, executor_thread_count)
//!     → configurator.rs
//!         → I/O runtime size (tokio worker threads)
//!         → DispatchStrategy
//!             Inline              (executor_thread_count == 0)
//!             Pooled(ordered.rs)  (per-connection FIFO on dedicated threads)
//! ```
//!
//! # Design Decisions
//! - I/O workers never block on handlers when a pool is configured
//! - Ordering is per connection only; connections do not order each other

pub mod configurator;
pub mod dispatch;
pub mod ordered;

pub use configurator::ConcurrencyConfigurator;
pub use dispatch::DispatchStrategy;
pub use ordered::{Job, OrderedExecutor};
