//! Pipeline extension points.
//!
//! # Responsibilities
//! - `Handler`: produce the response for a resolved route
//! - `Preprocessor`: inspect or amend the request before dispatch
//! - `Postprocessor`: augment a successful response
//! - `FinallyProcessor`: run after every request, whatever the outcome
//! - `MessageObserver`: watch the request lifecycle without steering it
//!
//! Closures implement the processor traits directly, so
//! `service.add_preprocessor(Arc::new(|req: &mut Request| Ok(())))` works.

use crate::error::HandlerError;
use crate::http::{Request, Response};

pub trait Handler: Send + Sync {
    fn handle(&self, request: &mut Request) -> Result<Response, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request) -> Result<Response, HandlerError> + Send + Sync,
{
    fn handle(&self, request: &mut Request) -> Result<Response, HandlerError> {
        self(request)
    }
}

pub trait Preprocessor: Send + Sync {
    fn process(&self, request: &mut Request) -> Result<(), HandlerError>;
}

impl<F> Preprocessor for F
where
    F: Fn(&mut Request) -> Result<(), HandlerError> + Send + Sync,
{
    fn process(&self, request: &mut Request) -> Result<(), HandlerError> {
        self(request)
    }
}

pub trait Postprocessor: Send + Sync {
    fn process(&self, request: &Request, response: &mut Response) -> Result<(), HandlerError>;
}

impl<F> Postprocessor for F
where
    F: Fn(&Request, &mut Response) -> Result<(), HandlerError> + Send + Sync,
{
    fn process(&self, request: &Request, response: &mut Response) -> Result<(), HandlerError> {
        self(request, response)
    }
}

/// Runs after every request. Failures are logged and never reach the client.
pub trait FinallyProcessor: Send + Sync {
    fn process(&self, request: &Request, response: &Response) -> Result<(), HandlerError>;
}

impl<F> FinallyProcessor for F
where
    F: Fn(&Request, &Response) -> Result<(), HandlerError> + Send + Sync,
{
    fn process(&self, request: &Request, response: &Response) -> Result<(), HandlerError> {
        self(request, response)
    }
}

/// Lifecycle listener. Hooks cannot fail; a panicking observer is not contained.
pub trait MessageObserver: Send + Sync {
    fn on_received(&self, _request: &Request) {}

    fn on_success(&self, _request: &Request, _response: &Response) {}

    fn on_exception(&self, _request: &Request, _error: &HandlerError) {}

    fn on_complete(&self, _request: &Request, _response: &Response) {}
}
