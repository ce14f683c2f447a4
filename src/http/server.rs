//! Per-connection HTTP serving.
//!
//! # Responsibilities
//! - Drive HTTP/1.1 on an accepted connection (hyper)
//! - Buffer request bodies up to `max_content_size`
//! - Hand each request to the dispatch strategy and write the response
//! - Finish in-flight requests when the endpoint drains
//!
//! # Design Decisions
//! - An oversized body fails the service call, so hyper closes the
//!   connection without writing a response
//! - The transport's connect timeout bounds how long a fresh connection may
//!   take to deliver its request head
//! - Unmapped pipeline failures are logged here, the boundary layer

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::concurrency::DispatchStrategy;
use crate::config::ServerSettings;
use crate::error::{ServiceError, ServiceErrorKind};
use crate::http::{Request, Response};
use crate::net::connection::{ConnectionGuard, ConnectionId};
use crate::pipeline::RequestPipeline;

/// Everything a connection needs to serve requests, frozen at bind.
pub struct HttpPipeline {
    pipeline: Arc<RequestPipeline>,
    dispatch: DispatchStrategy,
    max_content_size: usize,
    keep_alive: bool,
}

impl HttpPipeline {
    pub fn new(
        pipeline: Arc<RequestPipeline>,
        dispatch: DispatchStrategy,
        server: &ServerSettings,
    ) -> Self {
        Self {
            pipeline,
            dispatch,
            max_content_size: server.max_content_size,
            keep_alive: server.keep_alive,
        }
    }

    pub fn dispatch(&self) -> &DispatchStrategy {
        &self.dispatch
    }

    pub fn request_pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Serve `stream` until the client goes away or `drain` flips to true.
    ///
    /// `connect_timeout` bounds the wait for each request head.
    pub async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        guard: ConnectionGuard,
        connect_timeout: Duration,
        mut drain: watch::Receiver<bool>,
    ) {
        let id = guard.id();
        let io = TokioIo::new(stream);

        let this = self.clone();
        let service = service_fn(move |req| {
            let this = this.clone();
            async move { this.handle(id, req).await }
        });

        let mut builder = http1::Builder::new();
        builder
            .keep_alive(self.keep_alive)
            .timer(TokioTimer::new())
            .header_read_timeout(connect_timeout);

        let conn = builder.serve_connection(io, service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            Ok(()) = drain.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        };

        if let Err(e) = result {
            if !e.is_incomplete_message() && !e.is_canceled() && !e.is_closed() {
                tracing::debug!(connection_id = %id, error = %e, "Connection error");
            }
        }

        self.dispatch.release(id);
        drop(guard);
    }

    async fn handle(
        self: Arc<Self>,
        connection: ConnectionId,
        req: hyper::Request<Incoming>,
    ) -> Result<axum::http::Response<Body>, axum::Error> {
        let (parts, incoming) = req.into_parts();
        let body = match axum::body::to_bytes(Body::new(incoming), self.max_content_size).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection,
                    limit = self.max_content_size,
                    error = %e,
                    "Request body rejected, closing connection"
                );
                return Err(e);
            }
        };

        let request = Request::from_parts(parts, body).with_connection(connection);
        let request_id = request.id().to_string();
        tracing::debug!(
            connection_id = %connection,
            request_id = %request_id,
            method = %request.method(),
            path = %request.path(),
            "Request received"
        );

        let pipeline = self.pipeline.clone();
        let outcome = self
            .dispatch
            .dispatch(connection, move || pipeline.process(request))
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(unhandled)) => {
                tracing::error!(
                    request_id = %request_id,
                    error = %unhandled.error,
                    "Unhandled request failure"
                );
                unhandled.response
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Request dispatch failed");
                Response::from_error(&ServiceError::new(
                    ServiceErrorKind::ServiceUnavailable,
                    e.to_string(),
                ))
            }
        };

        Ok(response.into_http())
    }
}

impl std::fmt::Debug for HttpPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPipeline")
            .field("dispatch", &self.dispatch)
            .field("max_content_size", &self.max_content_size)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}
