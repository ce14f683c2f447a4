//! Bind, shutdown and plugin lifecycle.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::Method;
use restkit::error::{PluginError, TransportError};
use restkit::lifecycle::plugin::{PHASE_BIND, PHASE_SHUTDOWN};
use restkit::{LifecycleError, Plugin, ProcessContext, Service};
use serde_json::json;

mod common;

fn ping_service(context: Arc<ProcessContext>) -> Service {
    let mut service = common::test_service(context);
    service
        .uri("/ping", common::json_handler(|_| json!("pong")))
        .method(Method::GET);
    service
}

fn ping(port: u16) -> u16 {
    common::client()
        .get(common::url(port, "/ping"))
        .send()
        .unwrap()
        .status()
        .as_u16()
}

#[test]
fn bind_explicit_port_then_shutdown_stops_listening() {
    let mut service = ping_service(ProcessContext::new());
    let port = common::free_port();

    let endpoint = service.bind_port(port).unwrap();
    assert_eq!(endpoint.port(), port);
    assert_eq!(service.port(), port);
    assert_eq!(ping(port), 200);

    service.shutdown().unwrap();
    assert!(endpoint.is_closed());
    assert!(!common::is_listening(port));
    assert!(service.endpoints().is_empty());
}

#[test]
fn bind_uses_configured_port() {
    let mut service = ping_service(ProcessContext::new());
    let port = common::free_port();
    service.set_port(port);

    let endpoint = service.bind().unwrap();
    assert_eq!(endpoint.port(), port);
    assert_eq!(ping(port), 200);
    service.shutdown().unwrap();
}

#[test]
fn bind_without_port_uses_default() {
    let mut service = ping_service(ProcessContext::new());
    assert_eq!(service.port(), restkit::config::DEFAULT_PORT);

    match service.bind() {
        Ok(endpoint) => {
            assert_eq!(endpoint.port(), restkit::config::DEFAULT_PORT);
            assert_eq!(ping(endpoint.port()), 200);
            service.shutdown().unwrap();
        }
        // Another process holds the default port on this machine.
        Err(LifecycleError::Transport(TransportError::Bind { addr, .. })) => {
            assert_eq!(addr.port(), restkit::config::DEFAULT_PORT);
        }
        Err(e) => panic!("unexpected bind failure: {}", e),
    }
}

#[test]
fn service_can_bind_again_after_shutdown() {
    let mut service = ping_service(ProcessContext::new());

    let first = service.bind_port(common::free_port()).unwrap();
    service.shutdown().unwrap();
    assert!(first.is_closed());

    let second = service.bind_port(common::free_port()).unwrap();
    assert_eq!(ping(second.port()), 200);
    service.shutdown().unwrap();
}

#[test]
fn one_service_binds_several_endpoints() {
    let mut service = ping_service(ProcessContext::new());
    let a = service.bind_port(common::free_port()).unwrap();
    let b = service.bind_port(common::free_port()).unwrap();

    assert_eq!(service.endpoints().len(), 2);
    assert_eq!(ping(a.port()), 200);
    assert_eq!(ping(b.port()), 200);

    service.shutdown().unwrap();
    assert!(a.is_closed() && b.is_closed());
}

#[test]
fn shutdown_closes_endpoints_of_every_service_in_context() {
    let context = ProcessContext::new();
    let mut orders = ping_service(context.clone());
    let mut billing = ping_service(context.clone());
    orders.set_name("orders");
    billing.set_name("billing");

    let orders_ep = orders.bind_port(common::free_port()).unwrap();
    let billing_ep = billing.bind_port(common::free_port()).unwrap();
    assert_eq!(context.endpoints().len(), 2);

    orders.shutdown().unwrap();
    assert!(context.endpoints().is_empty());
    assert!(orders_ep.is_closed());
    assert!(billing_ep.is_closed());
    assert!(orders.endpoints().is_empty());
    assert!(billing.endpoints().is_empty());
    assert!(!common::is_listening(billing_ep.port()));

    billing.shutdown().unwrap();
}

#[test]
fn separate_contexts_shut_down_independently() {
    let mut a = ping_service(ProcessContext::new());
    let mut b = ping_service(ProcessContext::new());
    let a_ep = a.bind_port(common::free_port()).unwrap();
    let b_ep = b.bind_port(common::free_port()).unwrap();

    a.shutdown().unwrap();
    assert!(a_ep.is_closed());
    assert!(!b_ep.is_closed());
    assert_eq!(ping(b_ep.port()), 200);

    b.shutdown().unwrap();
}

#[test]
fn bind_on_occupied_port_fails() {
    let holder = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();

    let mut service = ping_service(ProcessContext::new());
    let result = service.bind_port(port);
    assert!(matches!(
        result,
        Err(LifecycleError::Transport(TransportError::Bind { .. }))
    ));
    assert!(service.context().endpoints().is_empty());
    service.shutdown().unwrap();
}

#[test]
fn invalid_base_url_is_rejected() {
    let mut service = ping_service(ProcessContext::new());
    service.set_base_url("not a url");
    assert!(matches!(
        service.bind_port(common::free_port()),
        Err(LifecycleError::InvalidConfig(_))
    ));
}

#[test]
fn await_shutdown_returns_when_triggered() {
    let mut service = ping_service(ProcessContext::new());
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let trigger = service.shutdown_handle();
    let signaller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        trigger.trigger();
    });

    service.await_shutdown().unwrap();
    signaller.join().unwrap();
    assert!(endpoint.is_closed());
}

type Events = Arc<Mutex<Vec<String>>>;

struct Recording {
    name: &'static str,
    events: Events,
    fail_bind: bool,
}

impl Recording {
    fn new(name: &'static str, events: &Events) -> Arc<Self> {
        Arc::new(Self {
            name,
            events: events.clone(),
            fail_bind: false,
        })
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Plugin for Recording {
    fn name(&self) -> &str {
        self.name
    }

    fn register(&self, service: &mut Service) -> Result<(), PluginError> {
        self.record(format!("{}:register", self.name));
        service.alias(self.name, "plugin");
        Ok(())
    }

    fn bind(&self, service: &Service) -> Result<(), PluginError> {
        let listening = service
            .endpoints()
            .last()
            .map(|ep| common::is_listening(ep.port()))
            .unwrap_or(false);
        self.record(format!("{}:bind:{}", self.name, listening));
        if self.fail_bind {
            return Err(PluginError::new(self.name, PHASE_BIND, "announce failed"));
        }
        Ok(())
    }

    fn shutdown(&self, service: &Service) -> Result<(), PluginError> {
        let closed = service.context().endpoints().is_empty();
        self.record(format!("{}:shutdown:{}", self.name, closed));
        Ok(())
    }
}

#[test]
fn plugin_hooks_run_in_order_at_each_phase() {
    let events = Events::default();
    let mut service = ping_service(ProcessContext::new());
    let first = Recording::new("first", &events);
    service
        .register_plugin(first.clone())
        .unwrap()
        .register_plugin(Recording::new("second", &events))
        .unwrap()
        .register_plugin(first)
        .unwrap();
    assert_eq!(service.plugins().names(), vec!["first", "second"]);

    service.bind_port(common::free_port()).unwrap();
    service.shutdown().unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "first:register",
            "second:register",
            "first:bind:true",
            "second:bind:true",
            "first:shutdown:true",
            "second:shutdown:true",
        ]
    );
}

#[test]
fn failing_bind_hook_stops_later_plugins() {
    let events = Events::default();
    let mut service = ping_service(ProcessContext::new());
    service
        .register_plugin(Arc::new(Recording {
            name: "broken",
            events: events.clone(),
            fail_bind: true,
        }))
        .unwrap()
        .register_plugin(Recording::new("after", &events))
        .unwrap();

    let port = common::free_port();
    match service.bind_port(port) {
        Err(LifecycleError::Plugin(e)) => {
            assert_eq!(e.plugin(), "broken");
            assert_eq!(e.phase(), PHASE_BIND);
        }
        other => panic!("expected plugin failure, got {:?}", other.map(|ep| ep.port())),
    }
    // The endpoint started before the hook ran and stays tracked.
    assert!(common::is_listening(port));
    assert_eq!(service.context().endpoints().len(), 1);

    service.shutdown().unwrap();
    assert!(!common::is_listening(port));
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "broken:register",
            "after:register",
            "broken:bind:true",
            "broken:shutdown:true",
            "after:shutdown:true",
        ]
    );
}

struct RefusesShutdown;

impl Plugin for RefusesShutdown {
    fn name(&self) -> &str {
        "refuses"
    }

    fn shutdown(&self, _service: &Service) -> Result<(), PluginError> {
        Err(PluginError::new("refuses", PHASE_SHUTDOWN, "flush failed"))
    }
}

#[test]
fn failing_shutdown_hook_propagates_after_endpoints_close() {
    let mut service = ping_service(ProcessContext::new());
    service.register_plugin(Arc::new(RefusesShutdown)).unwrap();
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let err = service.shutdown().unwrap_err();
    assert!(matches!(err, LifecycleError::Plugin(ref e) if e.phase() == PHASE_SHUTDOWN));
    assert!(endpoint.is_closed());
}
