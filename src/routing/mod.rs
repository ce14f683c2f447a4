//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route declaration (before bind):
//!     Service::uri / Service::regex
//!     → table.rs (RouteBuilder per route, registration order)
//!
//! Route compilation (at bind):
//!     RouteTable + RouteDefaults
//!     → builder.rs (method set, handler per method, RouteInfo)
//!     → matcher.rs (compile both dialects to anchored regexes)
//!     → Freeze as immutable RouteResolver
//!
//! Incoming request (method, path)
//!     → resolver.rs (first route matching path and method)
//!     → Return: ResolvedRoute | RouteNotFound | MethodNotAllowed
//! ```
//!
//! # Design Decisions
//! - Routes compiled at bind, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order, across both dialects)

pub mod builder;
pub mod matcher;
pub mod resolver;
pub mod table;

pub use builder::{CompiledRoute, RouteBuilder, RouteInfo, RouteMetadata, DEFAULT_METHODS};
pub use matcher::{ParameterizedMatcher, PathMatcher, PathParams, PatternKind, RegexMatcher};
pub use resolver::{ResolvedRoute, RouteResolver};
pub use table::RouteTable;
