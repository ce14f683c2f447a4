//! Route declarations.
//!
//! # Responsibilities
//! - Collect the method set, per-method handler overrides and route metadata
//! - Compile into a `CompiledRoute` against the shared `RouteDefaults`
//!
//! # Design Decisions
//! - A route accepts GET, PUT, POST and DELETE until a method is declared
//!   explicitly; the first explicit declaration replaces that default set
//! - `action(method, handler)` also declares the method

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::http::Method;
use serde::Serialize;

use crate::config::RouteDefaults;
use crate::error::RouteError;
use crate::pipeline::Handler;
use crate::routing::matcher::{ParameterizedMatcher, PathMatcher, PatternKind, RegexMatcher};

/// Methods accepted by a route nobody restricted.
pub const DEFAULT_METHODS: [Method; 4] = [Method::GET, Method::PUT, Method::POST, Method::DELETE];

pub struct RouteBuilder {
    pattern: String,
    kind: PatternKind,
    handler: Arc<dyn Handler>,
    methods: Vec<Method>,
    explicit_methods: bool,
    actions: Vec<(Method, Arc<dyn Handler>)>,
    name: Option<String>,
    flags: BTreeSet<String>,
    parameters: BTreeMap<String, String>,
    default_format: Option<String>,
}

impl RouteBuilder {
    pub fn new(pattern: impl Into<String>, kind: PatternKind, handler: Arc<dyn Handler>) -> Self {
        Self {
            pattern: pattern.into(),
            kind,
            handler,
            methods: DEFAULT_METHODS.to_vec(),
            explicit_methods: false,
            actions: Vec::new(),
            name: None,
            flags: BTreeSet::new(),
            parameters: BTreeMap::new(),
            default_format: None,
        }
    }

    /// Accept `method` on this route.
    pub fn method(&mut self, method: Method) -> &mut Self {
        if !self.explicit_methods {
            self.methods.clear();
            self.explicit_methods = true;
        }
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Accept `method` and serve it with `handler` instead of the route handler.
    pub fn action(&mut self, method: Method, handler: Arc<dyn Handler>) -> &mut Self {
        self.method(method.clone());
        self.actions.retain(|(m, _)| *m != method);
        self.actions.push((method, handler));
        self
    }

    /// Name used by `RouteResolver::url_for` and visible to handlers.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn flag(&mut self, flag: impl Into<String>) -> &mut Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn parameter(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Format used when the request path carries no `{format}` parameter.
    pub fn default_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.default_format = Some(format.into());
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn metadata(&self) -> RouteMetadata {
        RouteMetadata {
            name: self.name.clone(),
            pattern: self.pattern.clone(),
            kind: self.kind,
            methods: self.methods.iter().map(|m| m.to_string()).collect(),
            flags: self.flags.iter().cloned().collect(),
            parameters: self.parameters.clone(),
            default_format: self.default_format.clone(),
        }
    }

    pub fn build(&self, defaults: &RouteDefaults) -> Result<CompiledRoute, RouteError> {
        if self.methods.is_empty() {
            return Err(RouteError::NoMethods {
                pattern: self.pattern.clone(),
            });
        }

        let matcher: Box<dyn PathMatcher> = match self.kind {
            PatternKind::Parameterized => Box::new(ParameterizedMatcher::new(&self.pattern)?),
            PatternKind::Regex => Box::new(RegexMatcher::new(&self.pattern)?),
        };

        let actions = self
            .methods
            .iter()
            .map(|method| {
                let handler = self
                    .actions
                    .iter()
                    .find(|(m, _)| m == method)
                    .map(|(_, h)| h.clone())
                    .unwrap_or_else(|| self.handler.clone());
                (method.clone(), handler)
            })
            .collect();

        let info = RouteInfo {
            name: self.name.clone(),
            pattern: self.pattern.clone(),
            kind: self.kind,
            methods: self.methods.clone(),
            flags: self.flags.clone(),
            parameters: self.parameters.clone(),
            default_format: self
                .default_format
                .clone()
                .unwrap_or_else(|| defaults.default_format.clone()),
            aliases: defaults.aliases.clone(),
        };

        Ok(CompiledRoute {
            matcher,
            actions,
            info: Arc::new(info),
        })
    }
}

impl std::fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("pattern", &self.pattern)
            .field("kind", &self.kind)
            .field("methods", &self.methods)
            .field("name", &self.name)
            .finish()
    }
}

/// Route details attached to a request after resolution.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    name: Option<String>,
    pattern: String,
    kind: PatternKind,
    methods: Vec<Method>,
    flags: BTreeSet<String>,
    parameters: BTreeMap<String, String>,
    default_format: String,
    aliases: BTreeMap<String, String>,
}

impl RouteInfo {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn default_format(&self) -> &str {
        &self.default_format
    }

    /// Type name registered for `alias`.
    pub fn alias(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }
}

/// A route ready for matching.
pub struct CompiledRoute {
    matcher: Box<dyn PathMatcher>,
    actions: Vec<(Method, Arc<dyn Handler>)>,
    info: Arc<RouteInfo>,
}

impl CompiledRoute {
    pub fn matcher(&self) -> &dyn PathMatcher {
        self.matcher.as_ref()
    }

    pub fn handler_for(&self, method: &Method) -> Option<&Arc<dyn Handler>> {
        self.actions.iter().find(|(m, _)| m == method).map(|(_, h)| h)
    }

    pub fn info(&self) -> &Arc<RouteInfo> {
        &self.info
    }
}

/// Serializable description of a declared route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub pattern: String,
    pub kind: PatternKind,
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_format: Option<String>,
}
