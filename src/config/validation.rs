//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, timeouts > 0)
//! - Validate addresses and the base URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before a service binds

use std::net::IpAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.name must not be empty")]
    EmptyName,

    #[error("server.bind_address '{0}' is not an IP address")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("routes.base_url '{0}' must be an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("routes.default_format must not be empty")]
    EmptyDefaultFormat,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }
    if config.server.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.server.bind_address.clone(),
        ));
    }
    if config.server.max_content_size == 0 {
        errors.push(ValidationError::Zero("server.max_content_size"));
    }
    if config.socket.receive_buffer_size == 0 {
        errors.push(ValidationError::Zero("socket.receive_buffer_size"));
    }
    if config.socket.connect_timeout_ms == 0 {
        errors.push(ValidationError::Zero("socket.connect_timeout_ms"));
    }

    let base_url = config.routes.base_url.trim();
    if !base_url.is_empty() {
        let valid = url::Url::parse(base_url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidBaseUrl(base_url.to_string()));
        }
    }
    if config.routes.default_format.trim().is_empty() {
        errors.push(ValidationError::EmptyDefaultFormat);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
