//! Transport: the I/O runtime and its listening endpoints.
//!
//! # Responsibilities
//! - Own the multi-threaded I/O runtime (sized by the I/O worker count)
//! - Bind endpoints and run one accept loop per endpoint
//! - Apply socket options to listeners and accepted connections
//! - Drain an endpoint's connections when it is stopped
//! - Release the runtime at shutdown
//!
//! # Design Decisions
//! - One runtime per transport; endpoints bound on it share its workers
//! - The transport can be rebound after a shutdown that did not release it
//! - Releasing drops the runtime with a bounded wait for blocking work

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;

use crate::error::TransportError;
use crate::http::HttpPipeline;
use crate::net::connection::ConnectionTracker;
use crate::net::endpoint::EndpointHandle;
use crate::net::listener::{self, SocketOptions};
use crate::observability::metrics;

/// A socket option understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    TcpNoDelay(bool),
    KeepAlive(bool),
    ReuseAddress(bool),
    Linger(Option<Duration>),
    ConnectTimeout(Duration),
    ReceiveBufferSize(usize),
}

/// Network transport capability.
pub trait Transport: Send {
    /// Pipeline used for connections accepted by later binds.
    fn set_pipeline(&mut self, pipeline: Arc<HttpPipeline>);

    fn set_option(&mut self, option: SocketOption);

    /// Start listening on `addr`. The endpoint is accepting when this returns.
    fn bind(&mut self, addr: SocketAddr) -> Result<EndpointHandle, TransportError>;

    /// Shut the I/O workers down. Later binds fail with `Released`.
    fn release_resources(&mut self, timeout: Duration);
}

/// TCP transport on a dedicated Tokio runtime.
pub struct TcpTransport {
    name: String,
    runtime: Option<Runtime>,
    pipeline: Option<Arc<HttpPipeline>>,
    options: SocketOptions,
    drain_timeout: Duration,
}

impl TcpTransport {
    /// Create the transport with `io_workers` runtime worker threads.
    pub fn new(name: &str, io_workers: usize, drain_timeout: Duration) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(io_workers.max(1))
            .thread_name(format!("{}-io", name))
            .enable_all()
            .build()
            .map_err(TransportError::Runtime)?;

        tracing::debug!(transport = %name, io_workers, "I/O runtime started");

        Ok(Self {
            name: name.to_string(),
            runtime: Some(runtime),
            pipeline: None,
            options: SocketOptions::default(),
            drain_timeout,
        })
    }

    pub fn options(&self) -> &SocketOptions {
        &self.options
    }

    /// Handle to the I/O runtime, for spawning service-level tasks.
    pub fn handle(&self) -> Option<Handle> {
        self.runtime.as_ref().map(|rt| rt.handle().clone())
    }

    pub fn is_released(&self) -> bool {
        self.runtime.is_none()
    }
}

impl Transport for TcpTransport {
    fn set_pipeline(&mut self, pipeline: Arc<HttpPipeline>) {
        self.pipeline = Some(pipeline);
    }

    fn set_option(&mut self, option: SocketOption) {
        match option {
            SocketOption::TcpNoDelay(v) => self.options.tcp_no_delay = v,
            SocketOption::KeepAlive(v) => self.options.keep_alive = v,
            SocketOption::ReuseAddress(v) => self.options.reuse_address = v,
            SocketOption::Linger(v) => self.options.linger = v,
            SocketOption::ConnectTimeout(v) => self.options.connect_timeout = v,
            SocketOption::ReceiveBufferSize(v) => self.options.receive_buffer_size = v,
        }
    }

    fn bind(&mut self, addr: SocketAddr) -> Result<EndpointHandle, TransportError> {
        let runtime = self.runtime.as_ref().ok_or(TransportError::Released)?;
        let pipeline = self.pipeline.clone().ok_or(TransportError::NoPipeline)?;

        let std_listener = listener::bind_listener(addr, &self.options)
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = std_listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;
        let tcp_listener = {
            let _enter = runtime.enter();
            TcpListener::from_std(std_listener)
                .map_err(|source| TransportError::Bind { addr, source })?
        };

        let endpoint = EndpointHandle::new(self.name.clone(), local_addr);
        runtime.spawn(accept_loop(
            tcp_listener,
            pipeline,
            self.options.clone(),
            endpoint.clone(),
            self.drain_timeout,
        ));

        metrics::record_endpoint_bound();
        tracing::debug!(transport = %self.name, endpoint = %local_addr, "Endpoint listening");
        Ok(endpoint)
    }

    fn release_resources(&mut self, timeout: Duration) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(timeout);
            tracing::debug!(transport = %self.name, "I/O runtime released");
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        // Safe to run from inside an async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("name", &self.name)
            .field("released", &self.runtime.is_none())
            .field("options", &self.options)
            .finish()
    }
}

async fn accept_loop(
    tcp: TcpListener,
    pipeline: Arc<HttpPipeline>,
    options: SocketOptions,
    endpoint: EndpointHandle,
    drain_timeout: Duration,
) {
    let _closed = endpoint.closed_guard();
    let tracker = ConnectionTracker::new();
    let (drain_tx, drain_rx) = watch::channel(false);

    loop {
        tokio::select! {
            biased;
            _ = endpoint.stop_requested() => break,
            result = tcp.accept() => match result {
                Ok((stream, peer)) => {
                    listener::configure_accepted(&stream, &options);
                    let guard = tracker.track();
                    tracing::trace!(
                        endpoint = %endpoint.local_addr(),
                        peer_addr = %peer,
                        connection_id = %guard.id(),
                        "Connection accepted"
                    );
                    tokio::spawn(pipeline.clone().serve_connection(
                        stream,
                        guard,
                        options.connect_timeout,
                        drain_rx.clone(),
                    ));
                }
                Err(e) => {
                    tracing::error!(endpoint = %endpoint.local_addr(), error = %e, "TCP accept error");
                }
            }
        }
    }

    drop(tcp);
    let _ = drain_tx.send(true);
    if tokio::time::timeout(drain_timeout, tracker.wait_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            endpoint = %endpoint.local_addr(),
            open = tracker.active_count(),
            "Connections still open after drain timeout"
        );
    }
    tracing::info!(endpoint = %endpoint.local_addr(), "Endpoint closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_without_pipeline_fails() {
        let mut transport = TcpTransport::new("test", 1, Duration::from_secs(1)).unwrap();
        let result = transport.bind("127.0.0.1:0".parse().unwrap());
        assert!(matches!(result, Err(TransportError::NoPipeline)));
    }

    #[test]
    fn released_transport_rejects_bind() {
        let mut transport = TcpTransport::new("test", 1, Duration::from_secs(1)).unwrap();
        transport.release_resources(Duration::from_secs(1));
        transport.release_resources(Duration::from_secs(1));
        assert!(transport.is_released());
        assert!(matches!(
            transport.bind("127.0.0.1:0".parse().unwrap()),
            Err(TransportError::Released)
        ));
    }

    #[test]
    fn options_are_recorded() {
        let mut transport = TcpTransport::new("test", 1, Duration::from_secs(1)).unwrap();
        transport.set_option(SocketOption::TcpNoDelay(false));
        transport.set_option(SocketOption::Linger(Some(Duration::from_secs(2))));
        transport.set_option(SocketOption::ReceiveBufferSize(4096));
        transport.set_option(SocketOption::ConnectTimeout(Duration::from_millis(250)));

        assert!(!transport.options().tcp_no_delay);
        assert_eq!(transport.options().linger, Some(Duration::from_secs(2)));
        assert_eq!(transport.options().receive_buffer_size, 4096);
        assert_eq!(transport.options().connect_timeout, Duration::from_millis(250));
    }
}
