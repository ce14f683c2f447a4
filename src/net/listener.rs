//! Listening socket setup and per-connection socket options.
//!
//! # Responsibilities
//! - Create the listening socket with reuse-address and receive-buffer options
//! - Apply no-delay, keep-alive and linger to each accepted connection
//!
//! # Design Decisions
//! - Options that must precede `bind` go through `socket2`
//! - Option failures on an accepted socket are logged, never fatal

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::TcpStream;

/// Pending connections the kernel may queue.
pub const LISTEN_BACKLOG: i32 = 1024;

/// Socket options applied by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    pub tcp_no_delay: bool,
    pub keep_alive: bool,
    pub reuse_address: bool,
    pub linger: Option<Duration>,
    /// Time a fresh connection has to deliver its request head.
    pub connect_timeout: Duration,
    pub receive_buffer_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            tcp_no_delay: true,
            keep_alive: true,
            reuse_address: true,
            linger: None,
            connect_timeout: Duration::from_secs(10),
            receive_buffer_size: 262_140,
        }
    }
}

/// Bind a non-blocking listening socket on `addr`.
pub fn bind_listener(addr: SocketAddr, options: &SocketOptions) -> io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(options.reuse_address)?;
    if options.receive_buffer_size > 0 {
        socket.set_recv_buffer_size(options.receive_buffer_size)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

/// Apply per-connection options to an accepted stream.
pub fn configure_accepted(stream: &TcpStream, options: &SocketOptions) {
    if let Err(e) = stream.set_nodelay(options.tcp_no_delay) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    let sock = SockRef::from(stream);
    if let Err(e) = sock.set_keepalive(options.keep_alive) {
        tracing::debug!(error = %e, "Failed to set SO_KEEPALIVE");
    }
    if let Err(e) = sock.set_linger(options.linger) {
        tracing::debug!(error = %e, "Failed to set SO_LINGER");
    }
}
