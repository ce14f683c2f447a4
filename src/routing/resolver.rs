//! Compiled route lookup.
//!
//! # Responsibilities
//! - Map (method, path) to a handler, walking routes in registration order
//! - Distinguish "no such path" from "path exists, method not allowed"
//! - Generate URLs for named routes
//!
//! # Design Decisions
//! - Immutable after compilation; shared by every connection through `Arc`
//! - Both pattern dialects live in one ordered list; the first route that
//!   matches the path and accepts the method wins
//! - The 405 `Allow` list is the union over every route matching the path

use std::sync::Arc;

use axum::http::Method;

use crate::error::RoutingError;
use crate::pipeline::Handler;
use crate::routing::builder::{CompiledRoute, RouteInfo};
use crate::routing::matcher::{PathParams, PatternKind};

/// Result of a successful lookup.
#[derive(Clone)]
pub struct ResolvedRoute {
    pub handler: Arc<dyn Handler>,
    pub params: PathParams,
    pub info: Arc<RouteInfo>,
}

impl std::fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("pattern", &self.info.pattern())
            .field("params", &self.params)
            .finish()
    }
}

pub struct RouteResolver {
    routes: Vec<CompiledRoute>,
    base_url: String,
}

impl RouteResolver {
    pub fn new(routes: Vec<CompiledRoute>, base_url: impl Into<String>) -> Self {
        Self {
            routes,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Result<ResolvedRoute, RoutingError> {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.matcher().match_path(path) else {
                continue;
            };
            if let Some(handler) = route.handler_for(method) {
                tracing::trace!(
                    method = %method,
                    path = %path,
                    pattern = %route.info().pattern(),
                    "Route matched"
                );
                return Ok(ResolvedRoute {
                    handler: handler.clone(),
                    params,
                    info: route.info().clone(),
                });
            }
            for m in route.info().methods() {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if allowed.is_empty() {
            tracing::debug!(method = %method, path = %path, "No route matched");
            Err(RoutingError::RouteNotFound {
                method: method.clone(),
                path: path.to_string(),
            })
        } else {
            tracing::debug!(method = %method, path = %path, ?allowed, "Method not allowed");
            Err(RoutingError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed,
            })
        }
    }

    /// URL of the parameterized route named `name`, prefixed with the base URL.
    ///
    /// An unsupplied `{format}` placeholder is dropped together with its
    /// leading dot; any other missing parameter yields `None`.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        let route = self.routes.iter().find(|r| {
            r.info().name() == Some(name) && r.info().kind() == PatternKind::Parameterized
        })?;

        let mut url = self.base_url.clone();
        let mut rest = route.info().pattern();
        while let Some(open) = rest.find('{') {
            let close = open + rest[open..].find('}')?;
            let key = &rest[open + 1..close];
            match params.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => {
                    url.push_str(&rest[..open]);
                    url.push_str(value);
                }
                None if key == "format" => {
                    url.push_str(rest[..open].strip_suffix('.').unwrap_or(&rest[..open]));
                }
                None => return None,
            }
            rest = &rest[close + 1..];
        }
        url.push_str(rest);
        Some(url)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for RouteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteResolver")
            .field("routes", &self.routes.len())
            .field("base_url", &self.base_url)
            .finish()
    }
}
