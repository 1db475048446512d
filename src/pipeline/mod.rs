//! Asynchronous content ingestion pipeline

pub mod processor;
pub mod queue;

pub use processor::Processor;
pub use queue::{PipelineJob, PipelineQueue};
