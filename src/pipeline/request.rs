//! Per-request pipeline execution.
//!
//! # Responsibilities
//! - Drive a request through RECEIVED → PREPROCESSING → DISPATCHING →
//!   (SUCCESS | FAILED) → POSTPROCESSING → FINALLY → COMPLETE
//! - Notify observers at RECEIVED, SUCCESS/FAILED and COMPLETE
//! - Normalize failures through the exception map
//! - Encode structured payloads with the request's codec
//! - Run every finally processor, containing their failures
//!
//! # Design Decisions
//! - Resolution happens right after RECEIVED; 404/405 enter FAILED directly
//! - Postprocessors run only on the success path, before encoding
//! - An unmapped failure still runs FINALLY and observers, then is handed to
//!   the boundary as `Unhandled` together with a generic 500 response
//! - A panic in a request stage is a FAILED outcome like any unmapped error
//! - Observer panics are not caught

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderValue;

use crate::error::{HandlerError, ServiceError, ServiceErrorKind};
use crate::http::request::REQUEST_ID_HEADER;
use crate::http::{Payload, Request, Response};
use crate::observability::metrics;
use crate::pipeline::chain::ProcessorChain;
use crate::routing::RouteResolver;
use crate::serialization::{Codec, SerializationProvider};

/// Pipeline state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Preprocessing,
    Dispatching,
    Success,
    Failed,
    Postprocessing,
    Finally,
    Complete,
}

/// A preprocessor, handler or postprocessor panicked.
#[derive(Debug, thiserror::Error)]
#[error("request stage panicked: {0}")]
struct StagePanicked(String);

/// A failure no exception mapping covered.
#[derive(Debug)]
pub struct Unhandled {
    pub error: HandlerError,
    /// Generic 500 written to the client.
    pub response: Response,
}

pub struct RequestPipeline {
    resolver: Arc<RouteResolver>,
    chain: ProcessorChain,
    serialization: Arc<dyn SerializationProvider>,
}

impl RequestPipeline {
    pub fn new(
        resolver: Arc<RouteResolver>,
        chain: ProcessorChain,
        serialization: Arc<dyn SerializationProvider>,
    ) -> Self {
        Self {
            resolver,
            chain,
            serialization,
        }
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    pub fn process(&self, mut request: Request) -> Result<Response, Unhandled> {
        let started = Instant::now();
        trace_stage(&request, Stage::Received);
        for observer in self.chain.observers() {
            observer.on_received(&request);
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run(&mut request))).unwrap_or_else(|panic| {
            Err(StagePanicked(panic_message(panic.as_ref()).to_string()).into())
        });

        let (mut response, unhandled) = match outcome {
            Ok(response) => {
                trace_stage(&request, Stage::Success);
                for observer in self.chain.observers() {
                    observer.on_success(&request, &response);
                }
                (response, None)
            }
            Err(err) => {
                trace_stage(&request, Stage::Failed);
                for observer in self.chain.observers() {
                    observer.on_exception(&request, &err);
                }
                match self.chain.exceptions().normalize(&err) {
                    Some(normalized) => {
                        tracing::debug!(
                            request_id = %request.id(),
                            kind = %normalized.kind(),
                            error = %err,
                            "Request failed"
                        );
                        (self.error_response(&request, &normalized), None)
                    }
                    None => {
                        let generic = ServiceError::new(
                            ServiceErrorKind::Internal,
                            "An unexpected error occurred",
                        );
                        (self.error_response(&request, &generic), Some(err))
                    }
                }
            }
        };

        if let Ok(value) = HeaderValue::from_str(request.id()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        self.run_finally(&request, &response);

        trace_stage(&request, Stage::Complete);
        for observer in self.chain.observers() {
            observer.on_complete(&request, &response);
        }
        metrics::record_request(request.method().as_str(), response.status().as_u16(), started);

        match unhandled {
            None => Ok(response),
            Some(error) => Err(Unhandled { error, response }),
        }
    }

    fn run(&self, request: &mut Request) -> Result<Response, HandlerError> {
        let resolved = self
            .resolver
            .resolve(request.method(), request.path())
            .map_err(ServiceError::from)?;
        request.bind_route(resolved.info.clone(), resolved.params);
        self.select_format(request)?;

        trace_stage(request, Stage::Preprocessing);
        for preprocessor in self.chain.preprocessors() {
            preprocessor.process(request)?;
        }

        trace_stage(request, Stage::Dispatching);
        let mut response = resolved.handler.handle(request)?;

        trace_stage(request, Stage::Postprocessing);
        for postprocessor in self.chain.postprocessors() {
            postprocessor.process(request, &mut response)?;
        }

        if let Some(codec) = request.codec() {
            encode(codec.as_ref(), &mut response)?;
        }
        Ok(response)
    }

    // `{format}` from the path wins over the route default. An explicit but
    // unknown format is a client error; an unknown default falls back to JSON.
    fn select_format(&self, request: &mut Request) -> Result<(), ServiceError> {
        let requested = request.param("format").map(str::to_string);
        let format = match (&requested, request.route()) {
            (Some(format), _) => format.clone(),
            (None, Some(route)) => route.default_format().to_string(),
            (None, None) => self.serialization.default_format().to_string(),
        };

        let codec = self.serialization.resolve(&format);
        if codec.is_none() && requested.is_some() {
            return Err(ServiceError::new(
                ServiceErrorKind::NotAcceptable,
                format!("Requested representation format not supported: {}", format),
            ));
        }
        request.set_format(format, codec);
        Ok(())
    }

    fn error_response(&self, request: &Request, err: &ServiceError) -> Response {
        let mut response = Response::from_error(err);
        let codec = request
            .codec()
            .cloned()
            .or_else(|| self.serialization.resolve(self.serialization.default_format()));
        if let Some(codec) = codec {
            if let Err(e) = encode(codec.as_ref(), &mut response) {
                tracing::warn!(request_id = %request.id(), error = %e, "Failed to encode error body");
            }
        }
        response
    }

    fn run_finally(&self, request: &Request, response: &Response) {
        trace_stage(request, Stage::Finally);
        for processor in self.chain.finally_processors() {
            match catch_unwind(AssertUnwindSafe(|| processor.process(request, response))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(
                        request_id = %request.id(),
                        error = %err,
                        "Finally processor failed"
                    );
                    metrics::record_finally_failure();
                }
                Err(panic) => {
                    tracing::error!(
                        request_id = %request.id(),
                        panic = %panic_message(panic.as_ref()),
                        "Finally processor panicked"
                    );
                    metrics::record_finally_failure();
                }
            }
        }
    }
}

fn encode(codec: &dyn Codec, response: &mut Response) -> Result<(), crate::serialization::CodecError> {
    if let Payload::Value(value) = response.payload() {
        let bytes = codec.encode(value)?;
        response.set_payload(Payload::Raw {
            bytes,
            content_type: codec.content_type(),
        });
    }
    Ok(())
}

fn trace_stage(request: &Request, stage: Stage) {
    tracing::trace!(request_id = %request.id(), ?stage, "Pipeline stage");
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("resolver", &self.resolver)
            .field("chain", &self.chain)
            .finish()
    }
}
