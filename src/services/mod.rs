//! Pipeline Services
//!
//! The per-event processing stages: dedup, validation, preload,
//! transform, grouping, publish, dead-letter, and the handler that
//! composes them.

pub mod dead_letter;
pub mod dedup;
pub mod grouper;
pub mod handler;
pub mod orchestrator;
pub mod preloader;
pub mod publisher;
pub mod transformer;
pub mod validator;

pub use dead_letter::{DeadLetterSink, LogDeadLetterSink};
pub use dedup::DedupService;
pub use grouper::{GroupingStrategy, OrderGrouper};
pub use handler::{EventHandler, EventOutcome};
pub use orchestrator::PipelineOrchestrator;
pub use preloader::{CachingPreloader, DataPreloader, Preloader};
pub use publisher::OrderPublisher;
pub use transformer::OrderTransformer;
pub use validator::{PartnerValidator, ValidationDecision};
