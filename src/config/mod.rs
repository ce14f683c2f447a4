//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)                 builder-style setters on Service
//!     → loader.rs (parse & deserialize)        │
//!     → validation.rs (semantic checks)  ◀─────┘ (at bind time)
//!     → ServiceConfig (snapshot frozen into the live pipeline)
//! ```
//!
//! # Design Decisions
//! - Settings are mutable only before bind; a bound endpoint keeps its snapshot
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ObservabilityConfig, RouteDefaults, ServerSettings, ServiceConfig, SocketSettings,
    DEFAULT_NAME, DEFAULT_PORT,
};
pub use validation::{validate_config, ValidationError};
