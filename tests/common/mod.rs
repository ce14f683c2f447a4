//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use restkit::{HandlerError, ProcessContext, Request, Response, Service};

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A loopback service with short timeouts and quiet startup.
pub fn test_service(context: Arc<ProcessContext>) -> Service {
    let mut service = Service::with_context(context);
    service
        .set_bind_address("127.0.0.1")
        .set_io_thread_count(2)
        .set_shutdown_timeout(Duration::from_secs(2))
        .no_diagnostics();
    service
}

pub fn json_handler(
    f: impl Fn(&mut Request) -> serde_json::Value + Send + Sync + 'static,
) -> Arc<dyn restkit::pipeline::Handler> {
    Arc::new(move |request: &mut Request| Ok::<_, HandlerError>(Response::json(f(request))))
}

pub fn client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", port, path)
}

/// Write `raw` to the service and read until the server closes.
///
/// Returns whatever was read; a reset connection yields what arrived first.
pub fn raw_exchange(port: u16, raw: &[u8]) -> String {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let mut stream = TcpStream::connect_timeout(&addr, Duration::from_secs(2)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let _ = stream.write_all(raw);

    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&received).into_owned()
}

pub fn is_listening(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_ok()
}
