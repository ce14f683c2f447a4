//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (hyper HTTP/1.1, body buffering, dispatch)
//!     → request.rs (method, path, params, request ID, body decoding)
//!     → [pipeline: resolve, processors, handler]
//!     → response.rs (status, headers, encoded payload)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{Request, REQUEST_ID_HEADER};
pub use response::{Payload, Response};
pub use server::HttpPipeline;
