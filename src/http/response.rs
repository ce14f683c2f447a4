//! Outbound response model.
//!
//! # Responsibilities
//! - Hold status, headers and a payload that is either raw bytes or a value
//! - Convert into an HTTP response once the pipeline has serialized the payload
//! - Build the normalized error body for `ServiceError`
//!
//! # Design Decisions
//! - Handlers return structured values; encoding happens once, in the pipeline
//! - Postprocessors see the unencoded value and may rewrite it

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    /// Already encoded bytes and their content type.
    Raw {
        bytes: Bytes,
        content_type: &'static str,
    },
    /// A structured value, encoded by the request's codec.
    Value(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    payload: Payload,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            payload: Payload::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::ok().with_payload(Payload::Value(value))
    }

    /// Serialize any `Serialize` value into a 200 response.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::json(serde_json::to_value(value)?))
    }

    pub fn created(value: serde_json::Value) -> Self {
        Self::json(value).with_status(StatusCode::CREATED)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::ok().with_payload(Payload::Raw {
            bytes: Bytes::from(body.into()),
            content_type: "text/plain; charset=utf-8",
        })
    }

    /// Normalized failure response: `{"error": <kind>, "message": ...}`.
    pub fn from_error(err: &ServiceError) -> Self {
        let mut response = Self::json(json!({
            "error": err.kind().label(),
            "message": err.message(),
        }))
        .with_status(err.status());

        if !err.allowed_methods().is_empty() {
            let allow = err
                .allowed_methods()
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers.insert(header::ALLOW, value);
            }
        }
        response
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    /// Structured value, if the payload has not been encoded yet.
    pub fn value(&self) -> Option<&serde_json::Value> {
        match &self.payload {
            Payload::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into the HTTP response written on the wire.
    pub fn into_http(self) -> axum::http::Response<Body> {
        let (body, content_type) = match self.payload {
            Payload::Empty => (Body::empty(), None),
            Payload::Raw {
                bytes,
                content_type,
            } => (Body::from(bytes), Some(content_type)),
            // Only reached when the pipeline had no codec for the format.
            Payload::Value(value) => (
                Body::from(value.to_string()),
                Some("application/json"),
            ),
        };

        let mut response = axum::http::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        if let Some(content_type) = content_type {
            if !response.headers().contains_key(header::CONTENT_TYPE) {
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(content_type),
                );
            }
        }
        response
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}
