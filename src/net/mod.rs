//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Transport::bind(addr)
//!     → listener.rs (socket2: reuse-address, receive buffer, listen)
//!     → transport.rs (accept loop on the I/O runtime)
//!     → listener.rs (no-delay, keep-alive, linger per connection)
//!     → connection.rs (connection ID, live-connection tracking)
//!     → Hand off to HTTP layer (http::server)
//!
//! Shutdown:
//!     endpoint.rs close → stop accepting → drain connections → closed
//! ```
//!
//! # Design Decisions
//! - Each connection tracked for graceful shutdown
//! - Endpoint handles are the only cross-service shared state (TrackedEndpointSet)

pub mod connection;
pub mod endpoint;
pub mod listener;
pub mod transport;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use endpoint::{EndpointHandle, TrackedEndpointSet};
pub use listener::SocketOptions;
pub use transport::{SocketOption, TcpTransport, Transport};
