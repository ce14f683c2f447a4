//! Request processing pipeline.
//!
//! # Data Flow
//! ```text
//! Request (buffered)
//!     → observers.on_received
//!     → resolver (route + params, format/codec selection)
//!     → preprocessors (registration order, first failure aborts)
//!     → handler
//!     → postprocessors (success path only)
//!     → codec encode
//!     → observers.on_success | on_exception + exception map
//!     → finally processors (all run, failures contained)
//!     → observers.on_complete
//!     → Response | Unhandled
//! ```
//!
//! # Design Decisions
//! - Processor lists are frozen into the pipeline at bind
//! - Execution is synchronous; the dispatch strategy decides which thread runs it

pub mod chain;
pub mod exception;
pub mod processor;
pub mod request;

pub use chain::ProcessorChain;
pub use exception::ExceptionMap;
pub use processor::{FinallyProcessor, Handler, MessageObserver, Postprocessor, Preprocessor};
pub use request::{RequestPipeline, Stage, Unhandled};
