//! Process-scope shared state.
//!
//! Every service that should shut down together is created with the same
//! `Arc<ProcessContext>`. It owns the tracked endpoint set and the
//! serialization provider, which is fixed on first use.

use std::sync::{Arc, OnceLock};

use crate::net::endpoint::TrackedEndpointSet;
use crate::serialization::{DefaultSerializationProvider, SerializationProvider};

#[derive(Default)]
pub struct ProcessContext {
    endpoints: TrackedEndpointSet,
    serialization: OnceLock<Arc<dyn SerializationProvider>>,
}

impl ProcessContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn endpoints(&self) -> &TrackedEndpointSet {
        &self.endpoints
    }

    /// Install the provider. Returns false if one was already set or used.
    pub fn set_serialization_provider(&self, provider: Arc<dyn SerializationProvider>) -> bool {
        self.serialization.set(provider).is_ok()
    }

    /// The provider, defaulting to JSON on first use.
    pub fn serialization_provider(&self) -> Arc<dyn SerializationProvider> {
        self.serialization
            .get_or_init(|| Arc::new(DefaultSerializationProvider::new()))
            .clone()
    }
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("endpoints", &self.endpoints.len())
            .field("serialization_set", &self.serialization.get().is_some())
            .finish()
    }
}
