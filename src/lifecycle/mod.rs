//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Bind (service.rs):
//!     Validate config → Build transport → Compile routes → Wire pipeline
//!     → Apply socket options → Listen → Track endpoint (context.rs)
//!     → Plugin bind hooks (plugin.rs)
//!
//! Shutdown (service.rs):
//!     Close tracked endpoints (stop accept, drain) → Plugin shutdown hooks
//!     → Release executor pools and I/O runtime
//!
//! Await shutdown:
//!     SIGINT/SIGTERM (signals.rs) or handle.trigger()
//!     → termination latch (shutdown.rs) → Shutdown
//! ```
//!
//! # Design Decisions
//! - Two-phase shutdown: close first, release pools second
//! - Endpoint tracking is shared through an explicit ProcessContext
//! - The shutdown wait blocks on a latch, woken immediately on trigger

pub mod context;
pub mod plugin;
pub mod shutdown;
pub mod signals;

pub use context::ProcessContext;
pub use plugin::{Plugin, PluginRegistry};
pub use shutdown::Shutdown;
