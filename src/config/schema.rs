//! Configuration schema definitions.
//!
//! This module defines the complete settings structure for a service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 8081;

/// Name used when none is configured.
pub const DEFAULT_NAME: &str = "RestKit";

/// Root configuration for a service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Server options (name, port, thread pools, limits).
    pub server: ServerSettings,

    /// Socket options applied to the listening endpoint.
    pub socket: SocketSettings,

    /// Defaults shared by every route builder.
    pub routes: RouteDefaults,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Server options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Service name, used in logs and metadata.
    pub name: String,

    /// Interface to listen on.
    pub bind_address: String,

    /// Listening port. 0 means unset: `DEFAULT_PORT` is used.
    pub port: u16,

    /// Non-blocking I/O worker threads. 0 selects twice the CPU count.
    pub io_thread_count: usize,

    /// Blocking executor pool size. 0 runs handlers on the I/O worker.
    pub executor_thread_count: usize,

    /// Largest accepted request body in bytes.
    pub max_content_size: usize,

    /// Keep connections open between requests.
    pub keep_alive: bool,

    /// Set SO_REUSEADDR on the listening socket.
    pub reuse_address: bool,

    /// Announce startup at info level instead of debug.
    pub diagnostics: bool,

    /// Upper bound for connection drain and pool release, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl ServerSettings {
    /// The port `bind()` will use: the configured one, or the default when unset.
    pub fn effective_port(&self) -> u16 {
        if self.port > 0 {
            self.port
        } else {
            DEFAULT_PORT
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: 0,
            io_thread_count: 0,
            executor_thread_count: 0,
            max_content_size: 25 * 1024 * 1024,
            keep_alive: true,
            reuse_address: true,
            diagnostics: true,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// Socket options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SocketSettings {
    /// Disable Nagle's algorithm on accepted connections.
    pub tcp_no_delay: bool,

    /// SO_LINGER in milliseconds. `None` leaves lingering off.
    pub so_linger_ms: Option<u64>,

    /// SO_RCVBUF on the listening socket, in bytes.
    pub receive_buffer_size: usize,

    /// Time a new connection has to deliver its first request head.
    pub connect_timeout_ms: u64,
}

impl SocketSettings {
    pub fn linger(&self) -> Option<Duration> {
        self.so_linger_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            tcp_no_delay: true,
            so_linger_ms: None,
            receive_buffer_size: 262_140,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Defaults shared by all route builders at compile time.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RouteDefaults {
    /// Prefix for generated URLs (e.g., "https://api.example.com").
    pub base_url: String,

    /// Serialization aliases: element name to type name.
    pub aliases: BTreeMap<String, String>,

    /// Format used when a request does not select one.
    pub default_format: String,
}

impl RouteDefaults {
    pub fn add_alias(&mut self, name: impl Into<String>, type_name: impl Into<String>) {
        self.aliases.insert(name.into(), type_name.into());
    }
}

impl Default for RouteDefaults {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            aliases: BTreeMap::new(),
            default_format: "json".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
