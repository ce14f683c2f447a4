//! Route declaration registry.
//!
//! # Responsibilities
//! - Accumulate route builders in both pattern dialects, in registration order
//! - Describe declared routes for metadata reporting
//! - Compile into an immutable `RouteResolver`

use std::sync::Arc;

use crate::config::RouteDefaults;
use crate::error::RouteError;
use crate::pipeline::Handler;
use crate::routing::builder::{RouteBuilder, RouteMetadata};
use crate::routing::matcher::PatternKind;
use crate::routing::resolver::RouteResolver;

#[derive(Debug, Default)]
pub struct RouteTable {
    builders: Vec<RouteBuilder>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a `{name}`-style route.
    pub fn uri(&mut self, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> &mut RouteBuilder {
        self.push(RouteBuilder::new(pattern, PatternKind::Parameterized, handler))
    }

    /// Declare a regular-expression route.
    pub fn regex(&mut self, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> &mut RouteBuilder {
        self.push(RouteBuilder::new(pattern, PatternKind::Regex, handler))
    }

    fn push(&mut self, builder: RouteBuilder) -> &mut RouteBuilder {
        let index = self.builders.len();
        self.builders.push(builder);
        &mut self.builders[index]
    }

    pub fn for_each_route_builder<F>(&self, mut visitor: F)
    where
        F: FnMut(&RouteBuilder),
    {
        for builder in &self.builders {
            visitor(builder);
        }
    }

    pub fn describe_routes(&self) -> Vec<RouteMetadata> {
        self.builders.iter().map(RouteBuilder::metadata).collect()
    }

    pub fn compile(&self, defaults: &RouteDefaults) -> Result<RouteResolver, RouteError> {
        let routes = self
            .builders
            .iter()
            .map(|b| b.build(defaults))
            .collect::<Result<Vec<_>, _>>()?;

        for route in &routes {
            tracing::debug!(
                pattern = %route.info().pattern(),
                kind = ?route.info().kind(),
                methods = ?route.info().methods(),
                "Route registered"
            );
        }
        tracing::info!(routes = routes.len(), "Route table compiled");

        Ok(RouteResolver::new(routes, defaults.base_url.clone()))
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}
