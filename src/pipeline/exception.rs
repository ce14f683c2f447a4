//! Failure normalization.
//!
//! # Responsibilities
//! - Map concrete failure types to `ServiceErrorKind`
//! - Normalize a `HandlerError` into the `ServiceError` sent to clients
//!
//! # Design Decisions
//! - Lookup matches the exact source type; no source-chain walk
//! - Re-mapping a type overwrites the earlier entry in place (last write wins)
//! - A `ServiceError` raised directly is already normalized and passes through

use std::any::TypeId;
use std::error::Error;

use crate::error::{HandlerError, ServiceError, ServiceErrorKind};

type Matches = fn(&HandlerError) -> bool;

#[derive(Clone)]
struct Mapping {
    source: TypeId,
    source_name: &'static str,
    matches: Matches,
    target: ServiceErrorKind,
}

/// Ordered mapping from failure types to normalized categories.
#[derive(Clone, Default)]
pub struct ExceptionMap {
    mappings: Vec<Mapping>,
}

impl ExceptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map failures of exactly type `E` to `target`.
    pub fn map<E>(&mut self, target: ServiceErrorKind) -> &mut Self
    where
        E: Error + Send + Sync + 'static,
    {
        let source = TypeId::of::<E>();
        if let Some(existing) = self.mappings.iter_mut().find(|m| m.source == source) {
            existing.target = target;
        } else {
            self.mappings.push(Mapping {
                source,
                source_name: std::any::type_name::<E>(),
                matches: |err| err.is::<E>(),
                target,
            });
        }
        self
    }

    /// Target category for failures of type `E`.
    pub fn lookup<E: Error + 'static>(&self) -> Option<ServiceErrorKind> {
        let source = TypeId::of::<E>();
        self.mappings
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.target)
    }

    /// Normalized failure for `err`, or `None` when it is unmapped.
    pub fn normalize(&self, err: &HandlerError) -> Option<ServiceError> {
        if let Some(service_err) = err.downcast_ref::<ServiceError>() {
            return Some(service_err.clone());
        }
        self.mappings
            .iter()
            .find(|m| (m.matches)(err))
            .map(|m| ServiceError::new(m.target, err.to_string()))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl std::fmt::Debug for ExceptionMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.mappings.iter().map(|m| (m.source_name, m.target)))
            .finish()
    }
}
