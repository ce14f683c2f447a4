//! Inbound request model.
//!
//! # Responsibilities
//! - Carry method, path, query, headers and the fully buffered body
//! - Expose path parameters bound by the resolver
//! - Decode the body through the codec selected for the request format
//! - Carry a request ID for log correlation
//!
//! # Design Decisions
//! - The body is buffered before the pipeline runs (bounded by `max_content_size`)
//! - Route information is attached by the pipeline after resolution
//! - `extensions` lets preprocessors hand typed values to handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header::HeaderName, Extensions, HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{ServiceError, ServiceErrorKind};
use crate::net::connection::ConnectionId;
use crate::routing::RouteInfo;
use crate::serialization::{Codec, JsonCodec};

/// Header carrying the request ID in and out.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct Request {
    id: String,
    connection: Option<ConnectionId>,
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    route: Option<Arc<RouteInfo>>,
    format: Option<String>,
    codec: Option<Arc<dyn Codec>>,
    extensions: Extensions,
}

impl Request {
    /// Build a request for `target` (path plus optional `?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            connection: None,
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            route: None,
            format: None,
            codec: None,
            extensions: Extensions::new(),
        }
    }

    /// Build from decoded HTTP parts. Reuses an incoming `x-request-id`.
    pub fn from_parts(parts: axum::http::request::Parts, body: Bytes) -> Self {
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let mut request = Self::new(parts.method, target);
        if let Some(id) = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            request.id = id.to_string();
        }
        request.headers = parts.headers;
        request.body = body;
        request
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_connection(mut self, connection: ConnectionId) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First value of a query-string parameter, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
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

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Path parameter bound by the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn route(&self) -> Option<&RouteInfo> {
        self.route.as_deref()
    }

    pub fn route_name(&self) -> Option<&str> {
        self.route.as_ref().and_then(|r| r.name())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.route.as_ref().is_some_and(|r| r.has_flag(flag))
    }

    /// Format selected for this request (`{format}` parameter or route default).
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Decode the body into `T` through the request's codec.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        let value = match &self.codec {
            Some(codec) => codec.decode(&self.body),
            None => JsonCodec.decode(&self.body),
        }
        .map_err(|e| ServiceError::bad_request(e.to_string()))?;

        serde_json::from_value(value).map_err(|e| {
            ServiceError::new(
                ServiceErrorKind::BadRequest,
                format!("Could not read request body: {}", e),
            )
        })
    }

    pub(crate) fn bind_route(
        &mut self,
        route: Arc<RouteInfo>,
        params: impl IntoIterator<Item = (String, String)>,
    ) {
        self.params.extend(params);
        self.route = Some(route);
    }

    pub(crate) fn set_format(&mut self, format: String, codec: Option<Arc<dyn Codec>>) {
        self.format = Some(format);
        self.codec = codec;
    }

    pub(crate) fn codec(&self) -> Option<&Arc<dyn Codec>> {
        self.codec.as_ref()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("params", &self.params)
            .field("body_len", &self.body.len())
            .finish()
    }
}
