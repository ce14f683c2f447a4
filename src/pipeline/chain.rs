//! Registered processors, observers and the exception map.

use std::sync::Arc;

use crate::error::ServiceErrorKind;
use crate::pipeline::exception::ExceptionMap;
use crate::pipeline::processor::{FinallyProcessor, MessageObserver, Postprocessor, Preprocessor};
use crate::registry::InstanceList;

/// Ordered, de-duplicated processor lists plus failure normalization.
///
/// Mutated while the service is being assembled; `bind` clones a snapshot
/// into the live pipeline.
#[derive(Clone, Default, Debug)]
pub struct ProcessorChain {
    preprocessors: InstanceList<dyn Preprocessor>,
    postprocessors: InstanceList<dyn Postprocessor>,
    finally_processors: InstanceList<dyn FinallyProcessor>,
    observers: InstanceList<dyn MessageObserver>,
    exceptions: ExceptionMap,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_preprocessor(&mut self, processor: Arc<dyn Preprocessor>) -> bool {
        self.preprocessors.add(processor)
    }

    pub fn add_postprocessor(&mut self, processor: Arc<dyn Postprocessor>) -> bool {
        self.postprocessors.add(processor)
    }

    pub fn add_finally_processor(&mut self, processor: Arc<dyn FinallyProcessor>) -> bool {
        self.finally_processors.add(processor)
    }

    pub fn add_observer(&mut self, observer: Arc<dyn MessageObserver>) -> bool {
        self.observers.add(observer)
    }

    pub fn map_exception<E>(&mut self, target: ServiceErrorKind)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.exceptions.map::<E>(target);
    }

    pub fn set_exception_map(&mut self, map: ExceptionMap) {
        self.exceptions = map;
    }

    pub fn preprocessors(&self) -> &InstanceList<dyn Preprocessor> {
        &self.preprocessors
    }

    pub fn postprocessors(&self) -> &InstanceList<dyn Postprocessor> {
        &self.postprocessors
    }

    pub fn finally_processors(&self) -> &InstanceList<dyn FinallyProcessor> {
        &self.finally_processors
    }

    pub fn observers(&self) -> &InstanceList<dyn MessageObserver> {
        &self.observers
    }

    pub fn exceptions(&self) -> &ExceptionMap {
        &self.exceptions
    }
}
