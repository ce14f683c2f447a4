//! Service assembly and lifecycle.
//!
//! # Responsibilities
//! - Builder-style configuration surface (settings, routes, processors, plugins)
//! - `bind`: validate, wire the pipeline, listen, track, run plugin hooks
//! - `shutdown`: close tracked endpoints, run plugin hooks, release pools
//! - `await_shutdown`: block until termination is signaled, then shut down
//!
//! # Design Decisions
//! - Configuration is frozen into the pipeline at each bind; mutating the
//!   service afterwards only affects later binds
//! - Endpoints are tracked in the shared `ProcessContext`, so one shutdown
//!   closes the endpoints of every service built on that context
//! - `bind`, `shutdown` and `await_shutdown` block; call them from plain
//!   threads, not from inside an async runtime

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::concurrency::{ConcurrencyConfigurator, OrderedExecutor};
use crate::config::{validate_config, ServiceConfig, ValidationError};
use crate::error::{LifecycleError, ServiceErrorKind};
use crate::http::HttpPipeline;
use crate::lifecycle::plugin::{Plugin, PluginRegistry};
use crate::lifecycle::{signals, ProcessContext, Shutdown};
use crate::net::endpoint::EndpointHandle;
use crate::net::transport::{SocketOption, TcpTransport, Transport};
use crate::pipeline::{
    ExceptionMap, FinallyProcessor, Handler, MessageObserver, Postprocessor, Preprocessor,
    ProcessorChain, RequestPipeline,
};
use crate::routing::{RouteBuilder, RouteMetadata, RouteResolver, RouteTable};

/// Serializable description of a service and its routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerMetadata {
    pub name: String,
    pub port: u16,
    pub base_url: String,
    pub default_format: String,
    pub aliases: std::collections::BTreeMap<String, String>,
    pub routes: Vec<RouteMetadata>,
}

pub struct Service {
    context: Arc<ProcessContext>,
    config: ServiceConfig,
    routes: RouteTable,
    chain: ProcessorChain,
    plugins: PluginRegistry,
    transport: Option<TcpTransport>,
    executors: Vec<Arc<OrderedExecutor>>,
    endpoints: Vec<EndpointHandle>,
    resolver: Option<Arc<RouteResolver>>,
    terminate: Arc<Shutdown>,
    active: bool,
}

impl Service {
    /// A service with its own process context.
    pub fn new() -> Self {
        Self::with_context(ProcessContext::new())
    }

    /// A service sharing `context` (and therefore shutdown) with others.
    pub fn with_context(context: Arc<ProcessContext>) -> Self {
        Self::from_config(ServiceConfig::default(), context)
    }

    pub fn from_config(config: ServiceConfig, context: Arc<ProcessContext>) -> Self {
        Self {
            context,
            config,
            routes: RouteTable::new(),
            chain: ProcessorChain::new(),
            plugins: PluginRegistry::new(),
            transport: None,
            executors: Vec::new(),
            endpoints: Vec::new(),
            resolver: None,
            terminate: Arc::new(Shutdown::new()),
            active: false,
        }
    }

    pub fn context(&self) -> &Arc<ProcessContext> {
        &self.context
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// The port `bind()` would use.
    pub fn port(&self) -> u16 {
        self.config.server.effective_port()
    }

    // Settings

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.config.server.name = name.into();
        self
    }

    pub fn set_bind_address(&mut self, address: impl Into<String>) -> &mut Self {
        self.config.server.bind_address = address.into();
        self
    }

    /// 0 selects the default port.
    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.config.server.port = port;
        self
    }

    /// 0 selects twice the available processors.
    pub fn set_io_thread_count(&mut self, count: usize) -> &mut Self {
        self.config.server.io_thread_count = count;
        self
    }

    /// 0 runs handlers inline on the I/O threads.
    pub fn set_executor_thread_count(&mut self, count: usize) -> &mut Self {
        self.config.server.executor_thread_count = count;
        self
    }

    pub fn set_max_content_size(&mut self, bytes: usize) -> &mut Self {
        self.config.server.max_content_size = bytes;
        self
    }

    pub fn set_use_tcp_no_delay(&mut self, enabled: bool) -> &mut Self {
        self.config.socket.tcp_no_delay = enabled;
        self
    }

    pub fn set_keep_alive(&mut self, enabled: bool) -> &mut Self {
        self.config.server.keep_alive = enabled;
        self
    }

    pub fn set_reuse_address(&mut self, enabled: bool) -> &mut Self {
        self.config.server.reuse_address = enabled;
        self
    }

    /// `None` turns lingering off.
    pub fn set_so_linger(&mut self, linger: Option<Duration>) -> &mut Self {
        self.config.socket.so_linger_ms = linger.map(|d| d.as_millis() as u64);
        self
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.socket.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn set_receive_buffer_size(&mut self, bytes: usize) -> &mut Self {
        self.config.socket.receive_buffer_size = bytes;
        self
    }

    /// Announce startup at info level (on) or debug level (off).
    pub fn set_diagnostics(&mut self, enabled: bool) -> &mut Self {
        self.config.server.diagnostics = enabled;
        self
    }

    pub fn no_diagnostics(&mut self) -> &mut Self {
        self.set_diagnostics(false)
    }

    pub fn set_shutdown_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.server.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.config.routes.base_url = base_url.into();
        self
    }

    pub fn set_default_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.config.routes.default_format = format.into();
        self
    }

    pub fn alias(&mut self, name: impl Into<String>, type_name: impl Into<String>) -> &mut Self {
        self.config.routes.add_alias(name, type_name);
        self
    }

    // Processors

    /// Normalize failures of exactly type `E` to `kind`. Last mapping wins.
    pub fn map_exception<E>(&mut self, kind: ServiceErrorKind) -> &mut Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.chain.map_exception::<E>(kind);
        self
    }

    pub fn set_exception_map(&mut self, map: ExceptionMap) -> &mut Self {
        self.chain.set_exception_map(map);
        self
    }

    pub fn add_preprocessor(&mut self, processor: Arc<dyn Preprocessor>) -> &mut Self {
        self.chain.add_preprocessor(processor);
        self
    }

    pub fn add_postprocessor(&mut self, processor: Arc<dyn Postprocessor>) -> &mut Self {
        self.chain.add_postprocessor(processor);
        self
    }

    pub fn add_finally_processor(&mut self, processor: Arc<dyn FinallyProcessor>) -> &mut Self {
        self.chain.add_finally_processor(processor);
        self
    }

    pub fn add_message_observer(&mut self, observer: Arc<dyn MessageObserver>) -> &mut Self {
        self.chain.add_observer(observer);
        self
    }

    pub fn processor_chain(&self) -> &ProcessorChain {
        &self.chain
    }

    /// Register `plugin` and run its `register` hook.
    ///
    /// Registering the same instance again does nothing. If the hook fails
    /// the plugin stays registered and the error is returned.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) -> Result<&mut Self, LifecycleError> {
        if !self.plugins.add(plugin.clone()) {
            return Ok(self);
        }
        tracing::debug!(plugin = %plugin.name(), "Registering plugin");
        plugin.register(self)?;
        Ok(self)
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    // Routes

    /// Declare a route with `{name}` path parameters.
    pub fn uri(&mut self, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> &mut RouteBuilder {
        self.routes.uri(pattern, handler)
    }

    /// Declare a route matched by a regular expression.
    pub fn regex(&mut self, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> &mut RouteBuilder {
        self.routes.regex(pattern, handler)
    }

    pub fn for_each_route_builder<F>(&self, visitor: F)
    where
        F: FnMut(&RouteBuilder),
    {
        self.routes.for_each_route_builder(visitor);
    }

    pub fn route_metadata(&self) -> ServerMetadata {
        ServerMetadata {
            name: self.config.server.name.clone(),
            port: self.port(),
            base_url: self.config.routes.base_url.clone(),
            default_format: self.config.routes.default_format.clone(),
            aliases: self.config.routes.aliases.clone(),
            routes: self.routes.describe_routes(),
        }
    }

    /// URL for the named route, using the routes as last bound.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        match &self.resolver {
            Some(resolver) => resolver.url_for(name, params),
            None => self.routes.compile(&self.config.routes).ok()?.url_for(name, params),
        }
    }

    // Lifecycle

    /// Live endpoints this service bound. Endpoints closed by a shutdown of
    /// another service on the same context are left out.
    pub fn endpoints(&self) -> Vec<EndpointHandle> {
        self.endpoints
            .iter()
            .filter(|ep| !ep.is_closed())
            .cloned()
            .collect()
    }

    /// Latch that ends `await_shutdown` when triggered.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.terminate.clone()
    }

    /// Bind on the configured port, or the default port when unset.
    pub fn bind(&mut self) -> Result<EndpointHandle, LifecycleError> {
        let port = self.config.server.port;
        self.bind_port(port)
    }

    /// Bind on `port` (0 selects the default port).
    pub fn bind_port(&mut self, port: u16) -> Result<EndpointHandle, LifecycleError> {
        self.config.server.port = port;
        validate_config(&self.config).map_err(LifecycleError::InvalidConfig)?;

        let port = self.config.server.effective_port();
        let ip: IpAddr = self.config.server.bind_address.parse().map_err(|_| {
            LifecycleError::InvalidConfig(vec![ValidationError::InvalidBindAddress(
                self.config.server.bind_address.clone(),
            )])
        })?;
        let addr = SocketAddr::new(ip, port);
        let timeout = self.config.server.shutdown_timeout();
        let configurator = ConcurrencyConfigurator::from_settings(&self.config.server);

        if self.transport.is_none() {
            self.transport = Some(TcpTransport::new(
                &self.config.server.name,
                configurator.io_worker_threads(),
                timeout,
            )?);
        }

        let resolver = Arc::new(self.routes.compile(&self.config.routes)?);
        let dispatch = configurator.build_strategy()?;
        let executor = dispatch.executor().cloned();
        let pipeline = Arc::new(RequestPipeline::new(
            resolver.clone(),
            self.chain.clone(),
            self.context.serialization_provider(),
        ));
        let http = Arc::new(HttpPipeline::new(pipeline, dispatch, &self.config.server));
        let options = self.socket_options();

        self.announce(port);

        let transport = self.transport.as_mut().ok_or(LifecycleError::NotBound)?;
        transport.set_pipeline(http);
        for option in options {
            transport.set_option(option);
        }
        let endpoint = match transport.bind(addr) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                if let Some(pool) = executor {
                    pool.shutdown(timeout);
                }
                return Err(e.into());
            }
        };

        self.context.endpoints().add(endpoint.clone());
        self.endpoints.retain(|ep| !ep.is_closed());
        self.endpoints.push(endpoint.clone());
        self.executors.extend(executor);
        self.resolver = Some(resolver);
        self.active = true;

        tracing::info!(
            service = %self.config.server.name,
            endpoint = %endpoint.local_addr(),
            "Service listening"
        );

        let plugins = self.plugins.clone();
        plugins.run_bind(self)?;

        Ok(endpoint)
    }

    fn announce(&self, port: u16) {
        let name = &self.config.server.name;
        if self.config.server.diagnostics {
            tracing::info!("Starting {} Server on port {}", name, port);
        } else {
            tracing::debug!("Starting {} Server on port {}", name, port);
        }
    }

    fn socket_options(&self) -> [SocketOption; 6] {
        let server = &self.config.server;
        let socket = &self.config.socket;
        [
            SocketOption::TcpNoDelay(socket.tcp_no_delay),
            SocketOption::KeepAlive(server.keep_alive),
            SocketOption::ReuseAddress(server.reuse_address),
            SocketOption::Linger(socket.linger()),
            SocketOption::ConnectTimeout(socket.connect_timeout()),
            SocketOption::ReceiveBufferSize(socket.receive_buffer_size),
        ]
    }

    /// Close every endpoint tracked in the process context, run plugin
    /// shutdown hooks, then release executor pools and I/O workers.
    ///
    /// A plugin failure aborts the remaining hooks and leaves the pools
    /// unreleased; calling `shutdown` again retries from the hooks.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        if !self.active && self.context.endpoints().is_empty() {
            return Ok(());
        }

        let timeout = self.config.server.shutdown_timeout();
        tracing::info!(service = %self.config.server.name, "Shutting down");

        let closed = self.context.endpoints().close_all(timeout);
        self.endpoints.clear();
        tracing::debug!(endpoints = closed.len(), "Tracked endpoints closed");

        let plugins = self.plugins.clone();
        plugins.run_shutdown(self)?;

        for pool in self.executors.drain(..) {
            pool.shutdown(timeout);
        }
        if let Some(mut transport) = self.transport.take() {
            transport.release_resources(timeout);
        }
        self.active = false;

        tracing::info!(service = %self.config.server.name, "Shutdown complete");
        Ok(())
    }

    /// Block until SIGINT, SIGTERM or `shutdown_handle().trigger()`, then
    /// run `shutdown`.
    pub fn await_shutdown(&mut self) -> Result<(), LifecycleError> {
        let handle = self
            .transport
            .as_ref()
            .and_then(TcpTransport::handle)
            .ok_or(LifecycleError::NotBound)?;

        let latch = self.terminate.clone();
        handle.spawn(signals::forward_termination(latch.clone()));

        tracing::info!(service = %self.config.server.name, "Awaiting shutdown signal");
        latch.wait();
        self.terminate = Arc::new(Shutdown::new());

        self.shutdown()
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.config.server.name)
            .field("port", &self.port())
            .field("routes", &self.routes.len())
            .field("plugins", &self.plugins.names())
            .field("endpoints", &self.endpoints.len())
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    use crate::error::HandlerError;
    use crate::http::{Request, Response};

    fn ok_handler() -> Arc<dyn Handler> {
        Arc::new(|_: &mut Request| Ok::<_, HandlerError>(Response::no_content()))
    }

    #[test]
    fn setters_chain_and_default_port_applies() {
        let mut service = Service::new();
        assert_eq!(service.port(), crate::config::DEFAULT_PORT);

        service
            .set_name("inventory")
            .set_port(9100)
            .set_executor_thread_count(4)
            .set_so_linger(Some(Duration::from_millis(1500)))
            .no_diagnostics()
            .alias("item", "inventory::Item");

        assert_eq!(service.name(), "inventory");
        assert_eq!(service.port(), 9100);
        assert_eq!(service.config().server.executor_thread_count, 4);
        assert_eq!(service.config().socket.so_linger_ms, Some(1500));
        assert!(!service.config().server.diagnostics);
    }

    #[test]
    fn metadata_lists_routes() {
        let mut service = Service::new();
        service.set_name("catalog").set_base_url("http://localhost:8081");
        service.uri("/items/{id}", ok_handler()).name("item").method(Method::GET);
        service.regex(r"/search/.*", ok_handler());

        let metadata = service.route_metadata();
        assert_eq!(metadata.name, "catalog");
        assert_eq!(metadata.port, 8081);
        assert_eq!(metadata.routes.len(), 2);
        assert_eq!(metadata.routes[0].methods, vec!["GET"]);

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["routes"][1]["kind"], "Regex");
        assert_eq!(
            service.url_for("item", &[("id", "3")]).as_deref(),
            Some("http://localhost:8081/items/3")
        );
    }

    #[test]
    fn shutdown_without_bind_is_noop() {
        let mut service = Service::new();
        service.shutdown().unwrap();
        service.shutdown().unwrap();
    }

    #[test]
    fn await_shutdown_requires_bind() {
        let mut service = Service::new();
        assert!(matches!(
            service.await_shutdown(),
            Err(LifecycleError::NotBound)
        ));
    }

    #[test]
    fn invalid_config_is_rejected_at_bind() {
        let mut service = Service::new();
        service.set_name("").set_max_content_size(0);
        match service.bind_port(0) {
            Err(LifecycleError::InvalidConfig(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected InvalidConfig, got {:?}", other.map(|e| e.port())),
        }
    }
}
