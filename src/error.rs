//! Error taxonomy.
//!
//! # Categories
//! - `RoutingError`: no route for the path, or no route for the method
//! - `HandlerError`: any failure raised by a processor or handler
//! - `ServiceError`: the normalized, client-facing failure
//! - `PluginError`: lifecycle hook failures, never contained
//! - `LifecycleError`: everything `bind`/`shutdown` can surface
//!
//! # Design Decisions
//! - `HandlerError` does not implement `Error`, so `?` lifts any error into it
//! - Exception mapping matches the exact source type (see `pipeline::exception`)

use std::fmt;
use std::net::SocketAddr;

use axum::http::{Method, StatusCode};
use serde::Serialize;

use crate::config::validation::ValidationError;

/// Normalized API failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ServiceErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Conflict,
    UnsupportedMediaType,
    Internal,
    ServiceUnavailable,
}

impl ServiceErrorKind {
    /// HTTP status used for the outward response.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ServiceErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ServiceErrorKind::NotFound => StatusCode::NOT_FOUND,
            ServiceErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServiceErrorKind::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            ServiceErrorKind::Conflict => StatusCode::CONFLICT,
            ServiceErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServiceErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable label written into error bodies.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceErrorKind::BadRequest => "BadRequest",
            ServiceErrorKind::Unauthorized => "Unauthorized",
            ServiceErrorKind::Forbidden => "Forbidden",
            ServiceErrorKind::NotFound => "NotFound",
            ServiceErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ServiceErrorKind::NotAcceptable => "NotAcceptable",
            ServiceErrorKind::Conflict => "Conflict",
            ServiceErrorKind::UnsupportedMediaType => "UnsupportedMediaType",
            ServiceErrorKind::Internal => "Internal",
            ServiceErrorKind::ServiceUnavailable => "ServiceUnavailable",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure already normalized into an API-facing category.
///
/// Handlers may return one directly; it bypasses the exception map.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    kind: ServiceErrorKind,
    message: String,
    allowed_methods: Vec<Method>,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            allowed_methods: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ServiceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Methods advertised in the `Allow` header of a 405 response.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }
}

/// Route resolution failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("{method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
}

impl From<RoutingError> for ServiceError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::RouteNotFound { ref path, .. } => {
                ServiceError::not_found(format!("Requested resource not found: {}", path))
            }
            RoutingError::MethodNotAllowed {
                ref method,
                ref path,
                ref allowed,
            } => {
                let mut service_err = ServiceError::new(
                    ServiceErrorKind::MethodNotAllowed,
                    format!("{} not supported for {}", method, path),
                );
                service_err.allowed_methods = allowed.clone();
                service_err
            }
        }
    }
}

/// Opaque failure raised by a preprocessor, handler, or postprocessor.
///
/// Intentionally not an `Error` impl, so any error converts with `?`.
pub struct HandlerError {
    inner: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl HandlerError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(err),
        }
    }

    /// Ad-hoc failure carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// True when the underlying failure is exactly `E`.
    pub fn is<E>(&self) -> bool
    where
        E: std::error::Error + 'static,
    {
        self.inner.is::<E>()
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.inner
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);

/// Route declaration failures surfaced when the table is compiled.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("route '{pattern}' accepts no methods")]
    NoMethods { pattern: String },
}

/// Transport (listener runtime) failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build I/O runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("no request pipeline installed")]
    NoPipeline,

    #[error("transport resources already released")]
    Released,
}

/// Failures handing a request to the execution strategy.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("executor pool is shut down")]
    Closed,

    #[error("dispatched task was dropped before completing")]
    Canceled,

    #[error("failed to start executor thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A plugin lifecycle hook failed. Never contained.
#[derive(Debug, thiserror::Error)]
#[error("plugin '{plugin}' failed during {phase}: {source}")]
pub struct PluginError {
    plugin: String,
    phase: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl PluginError {
    pub fn new<E>(plugin: impl Into<String>, phase: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            plugin: plugin.into(),
            phase,
            source: source.into(),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }
}

/// Failures of the bind/shutdown lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("service is not bound")]
    NotBound,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
