//! Lifecycle-aware extensions.
//!
//! # Responsibilities
//! - Hold plugins in registration order, each instance at most once
//! - Run `bind` hooks after an endpoint is listening
//! - Run `shutdown` hooks once endpoints are closed, before pools are released
//!
//! # Design Decisions
//! - No failure isolation: the first failing hook stops the sequence and its
//!   error propagates to the caller of `bind` / `shutdown`

use std::sync::Arc;

use crate::error::PluginError;
use crate::registry::InstanceList;
use crate::service::Service;

/// Phase names carried by `PluginError`.
pub const PHASE_REGISTER: &str = "register";
pub const PHASE_BIND: &str = "bind";
pub const PHASE_SHUTDOWN: &str = "shutdown";

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Runs once, when the plugin is registered. May configure the service.
    fn register(&self, _service: &mut Service) -> Result<(), PluginError> {
        Ok(())
    }

    /// Runs after each successful bind.
    fn bind(&self, _service: &Service) -> Result<(), PluginError> {
        Ok(())
    }

    /// Runs during shutdown, after endpoints have closed.
    fn shutdown(&self, _service: &Service) -> Result<(), PluginError> {
        Ok(())
    }
}

#[derive(Clone, Default, Debug)]
pub struct PluginRegistry {
    plugins: InstanceList<dyn Plugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when this instance is already registered.
    pub fn add(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        self.plugins.add(plugin)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub(crate) fn run_bind(&self, service: &Service) -> Result<(), PluginError> {
        for plugin in &self.plugins {
            tracing::debug!(plugin = %plugin.name(), "Running plugin bind hook");
            plugin.bind(service)?;
        }
        Ok(())
    }

    pub(crate) fn run_shutdown(&self, service: &Service) -> Result<(), PluginError> {
        for plugin in &self.plugins {
            tracing::debug!(plugin = %plugin.name(), "Running plugin shutdown hook");
            plugin.shutdown(service)?;
        }
        Ok(())
    }
}
