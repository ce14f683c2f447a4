//! End-to-end request handling over a bound service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::Method;
use restkit::pipeline::{FinallyProcessor, MessageObserver};
use restkit::{HandlerError, ProcessContext, Request, Response, ServiceError, ServiceErrorKind};
use serde_json::{json, Value};

mod common;

#[derive(Debug, thiserror::Error)]
#[error("no such account: {0}")]
struct MissingAccount(String);

#[derive(Debug, thiserror::Error)]
#[error("ledger corrupted")]
struct LedgerCorrupted;

#[test]
fn serves_path_parameters_as_json() {
    let mut service = common::test_service(ProcessContext::new());
    service
        .uri(
            "/accounts/{id}",
            common::json_handler(|r| json!({ "id": r.param("id"), "verb": r.method().as_str() })),
        )
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let response = common::client()
        .get(common::url(endpoint.port(), "/accounts/acme"))
        .send()
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: Value = response.json().unwrap();
    assert_eq!(body, json!({ "id": "acme", "verb": "GET" }));

    service.shutdown().unwrap();
}

#[test]
fn unresolved_requests_get_normalized_errors() {
    let mut service = common::test_service(ProcessContext::new());
    service
        .uri("/accounts/{id}", common::json_handler(|_| json!({})))
        .method(Method::GET)
        .method(Method::PUT);
    let endpoint = service.bind_port(common::free_port()).unwrap();
    let client = common::client();

    let missing = client
        .get(common::url(endpoint.port(), "/nowhere"))
        .send()
        .unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().unwrap();
    assert_eq!(body["error"], "NotFound");

    let wrong_method = client
        .delete(common::url(endpoint.port(), "/accounts/1"))
        .send()
        .unwrap();
    assert_eq!(wrong_method.status(), 405);
    let allow = wrong_method.headers()["allow"].to_str().unwrap().to_string();
    assert!(allow.contains("GET") && allow.contains("PUT"));

    service.shutdown().unwrap();
}

#[test]
fn handler_failures_follow_exception_map() {
    let mut service = common::test_service(ProcessContext::new());
    service.map_exception::<MissingAccount>(ServiceErrorKind::NotFound);
    service
        .uri(
            "/accounts/{id}",
            Arc::new(|r: &mut Request| -> Result<Response, HandlerError> {
                match r.param("id") {
                    Some("corrupt") => Err(LedgerCorrupted.into()),
                    Some("taken") => Err(ServiceError::conflict("account exists").into()),
                    Some(id) => Err(MissingAccount(id.to_string()).into()),
                    None => Ok(Response::no_content()),
                }
            }),
        )
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();
    let client = common::client();
    let get = |path: &str| {
        client
            .get(common::url(endpoint.port(), path))
            .send()
            .unwrap()
    };

    let mapped = get("/accounts/ghost");
    assert_eq!(mapped.status(), 404);
    let body: Value = mapped.json().unwrap();
    assert_eq!(body["message"], "no such account: ghost");

    let direct = get("/accounts/taken");
    assert_eq!(direct.status(), 409);

    let unmapped = get("/accounts/corrupt");
    assert_eq!(unmapped.status(), 500);
    let body: Value = unmapped.json().unwrap();
    assert_eq!(body["error"], "Internal");
    assert!(!body["message"].as_str().unwrap().contains("ledger"));

    service.shutdown().unwrap();
}

#[test]
fn first_registered_route_wins() {
    let mut service = common::test_service(ProcessContext::new());
    service
        .regex(r"/files/.*", common::json_handler(|_| json!("regex")))
        .method(Method::GET);
    service
        .uri("/files/{name}", common::json_handler(|_| json!("uri")))
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let body: Value = common::client()
        .get(common::url(endpoint.port(), "/files/report"))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(body, json!("regex"));

    service.shutdown().unwrap();
}

#[test]
fn format_suffix_selects_codec() {
    let mut service = common::test_service(ProcessContext::new());
    service
        .uri(
            "/reports/{id}.{format}",
            common::json_handler(|r| json!({ "format": r.format() })),
        )
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();
    let client = common::client();

    let json_report = client
        .get(common::url(endpoint.port(), "/reports/7.json"))
        .send()
        .unwrap();
    assert_eq!(json_report.status(), 200);
    let body: Value = json_report.json().unwrap();
    assert_eq!(body["format"], "json");

    let xml_report = client
        .get(common::url(endpoint.port(), "/reports/7.xml"))
        .send()
        .unwrap();
    assert_eq!(xml_report.status(), 406);

    service.shutdown().unwrap();
}

struct CountingFinally(Arc<AtomicUsize>);

impl FinallyProcessor for CountingFinally {
    fn process(&self, _request: &Request, _response: &Response) -> Result<(), HandlerError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct PanickingFinally;

impl FinallyProcessor for PanickingFinally {
    fn process(&self, _request: &Request, _response: &Response) -> Result<(), HandlerError> {
        panic!("audit sink unavailable");
    }
}

#[derive(Default)]
struct StatusLog(Mutex<Vec<u16>>);

impl MessageObserver for StatusLog {
    fn on_complete(&self, _request: &Request, response: &Response) {
        self.0.lock().unwrap().push(response.status().as_u16());
    }
}

#[test]
fn finally_runs_for_every_outcome_and_contains_failures() {
    let count = Arc::new(AtomicUsize::new(0));
    let log = Arc::new(StatusLog::default());

    let mut service = common::test_service(ProcessContext::new());
    service
        .add_finally_processor(Arc::new(PanickingFinally))
        .add_finally_processor(Arc::new(CountingFinally(count.clone())))
        .add_message_observer(log.clone());
    service
        .uri("/ok", common::json_handler(|_| json!(true)))
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();
    let client = common::client();

    let ok = client.get(common::url(endpoint.port(), "/ok")).send().unwrap();
    assert_eq!(ok.status(), 200);
    let missing = client
        .get(common::url(endpoint.port(), "/missing"))
        .send()
        .unwrap();
    assert_eq!(missing.status(), 404);

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(*log.0.lock().unwrap(), vec![200, 404]);

    service.shutdown().unwrap();
}

#[test]
fn incoming_request_id_is_echoed() {
    let mut service = common::test_service(ProcessContext::new());
    service
        .uri("/ping", common::json_handler(|r| json!(r.id())))
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let response = common::client()
        .get(common::url(endpoint.port(), "/ping"))
        .header("x-request-id", "trace-42")
        .send()
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");
    let body: Value = response.json().unwrap();
    assert_eq!(body, json!("trace-42"));

    service.shutdown().unwrap();
}

#[test]
fn oversized_body_closes_connection_without_response() {
    let mut service = common::test_service(ProcessContext::new());
    service.set_max_content_size(64);
    service
        .uri("/upload", common::json_handler(|r| json!(r.body().len())))
        .method(Method::POST);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let small = common::raw_exchange(
        endpoint.port(),
        b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    );
    assert!(small.starts_with("HTTP/1.1 200"), "{}", small);

    let mut large = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 1024\r\nConnection: close\r\n\r\n".to_vec();
    large.extend(std::iter::repeat(b'x').take(1024));
    let rejected = common::raw_exchange(endpoint.port(), &large);
    assert!(!rejected.starts_with("HTTP/1.1"), "{}", rejected);

    service.shutdown().unwrap();
}

fn thread_name() -> String {
    std::thread::current().name().unwrap_or_default().to_string()
}

#[test]
fn inline_dispatch_runs_on_io_threads() {
    let mut service = common::test_service(ProcessContext::new());
    service.set_name("inline").set_executor_thread_count(0);
    service
        .uri("/where", common::json_handler(|_| json!(thread_name())))
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let body: Value = common::client()
        .get(common::url(endpoint.port(), "/where"))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(body, json!("inline-io"));

    service.shutdown().unwrap();
}

#[test]
fn pooled_dispatch_runs_on_executor_threads() {
    let mut service = common::test_service(ProcessContext::new());
    service.set_name("pooled").set_executor_thread_count(2);
    service
        .uri("/where", common::json_handler(|_| json!(thread_name())))
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let body: Value = common::client()
        .get(common::url(endpoint.port(), "/where"))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert!(body.as_str().unwrap().starts_with("pooled-executor-"), "{}", body);

    service.shutdown().unwrap();
}

#[test]
fn pipelined_requests_answer_in_order_on_pool() {
    let mut service = common::test_service(ProcessContext::new());
    service.set_executor_thread_count(4);
    service
        .uri(
            "/work/{ms}",
            common::json_handler(|r| {
                let ms: u64 = r.param("ms").and_then(|v| v.parse().ok()).unwrap_or(0);
                std::thread::sleep(Duration::from_millis(ms));
                json!(ms)
            }),
        )
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let raw = "GET /work/150 HTTP/1.1\r\nHost: localhost\r\n\r\n\
               GET /work/50 HTTP/1.1\r\nHost: localhost\r\n\r\n\
               GET /work/0 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    let received = common::raw_exchange(endpoint.port(), raw.as_bytes());

    let first = received.find("\r\n\r\n150").unwrap();
    let second = received.find("\r\n\r\n50").unwrap();
    let third = received.find("\r\n\r\n0").unwrap();
    assert!(first < second && second < third, "{}", received);

    service.shutdown().unwrap();
}

#[test]
fn route_metadata_describes_routes() {
    let mut service = common::test_service(ProcessContext::new());
    service.set_name("catalog");
    service
        .uri("/items/{id}", common::json_handler(|_| json!({})))
        .name("item")
        .flag("cached");
    let metadata = serde_json::to_value(service.route_metadata()).unwrap();
    service
        .uri(
            "/_routes",
            common::json_handler(move |_| metadata.clone()),
        )
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let body: Value = common::client()
        .get(common::url(endpoint.port(), "/_routes"))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(body["name"], "catalog");
    assert_eq!(body["routes"][0]["name"], "item");
    assert_eq!(body["routes"][0]["methods"], json!(["GET", "PUT", "POST", "DELETE"]));
    assert_eq!(body["routes"][0]["flags"], json!(["cached"]));

    service.shutdown().unwrap();
}

fn panicking_service(executor_threads: usize, finally_runs: &Arc<AtomicUsize>) -> restkit::Service {
    let mut service = common::test_service(ProcessContext::new());
    service
        .set_executor_thread_count(executor_threads)
        .add_finally_processor(Arc::new(CountingFinally(finally_runs.clone())));
    service
        .uri(
            "/boom",
            Arc::new(|_: &mut Request| -> Result<Response, HandlerError> {
                panic!("handler exploded")
            }),
        )
        .method(Method::GET);
    service
}

#[test]
fn handler_panic_is_a_failed_request_on_every_dispatch_strategy() {
    for executor_threads in [0, 2] {
        let finally_runs = Arc::new(AtomicUsize::new(0));
        let mut service = panicking_service(executor_threads, &finally_runs);
        let endpoint = service.bind_port(common::free_port()).unwrap();

        let response = common::client()
            .get(common::url(endpoint.port(), "/boom"))
            .header("x-request-id", "panic-1")
            .send()
            .unwrap();
        assert_eq!(response.status(), 500, "executor threads: {}", executor_threads);
        assert_eq!(response.headers()["x-request-id"], "panic-1");
        let body: Value = response.json().unwrap();
        assert_eq!(body["error"], "Internal");
        assert_eq!(finally_runs.load(Ordering::SeqCst), 1);

        service.shutdown().unwrap();
    }
}

#[test]
fn idle_fresh_connection_is_closed_after_connect_timeout() {
    use std::io::{ErrorKind, Read};
    use std::net::{SocketAddr, TcpStream};

    let mut service = common::test_service(ProcessContext::new());
    service.set_connect_timeout(Duration::from_millis(200));
    service
        .uri("/ping", common::json_handler(|_| json!("pong")))
        .method(Method::GET);
    let endpoint = service.bind_port(common::free_port()).unwrap();

    let addr = SocketAddr::from(([127, 0, 0, 1], endpoint.port()));
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let mut buf = [0u8; 512];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            // Some servers answer the timeout with a 408 before closing.
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::ConnectionReset => break,
            Err(e) => panic!("connection still open after connect timeout: {}", e),
        }
    }

    service.shutdown().unwrap();
}
