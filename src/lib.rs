//! RestKit: an embeddable REST service framework.
//!
//! Declare routes, attach processors and plugins, then bind a `Service`
//! to a port. Requests flow through a staged pipeline
//! (observers, preprocessors, handler, postprocessors, finally processors)
//! and are dispatched either inline on the I/O threads or on an ordered
//! executor pool that keeps each connection's requests in order.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Request processing
pub mod concurrency;
pub mod pipeline;
pub mod serialization;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod registry;

pub mod service;

pub use config::ServiceConfig;
pub use error::{HandlerError, LifecycleError, ServiceError, ServiceErrorKind};
pub use http::{Request, Response};
pub use lifecycle::{Plugin, ProcessContext, Shutdown};
pub use service::{ServerMetadata, Service};
