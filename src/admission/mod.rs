//! Admission of inbound Slack deliveries.
//!
//! Ties together the signature gate, the envelope parser and the
//! deduplication cache, and hands admitted events to an [`EventProcessor`]
//! without blocking the acknowledgement.

pub mod pipeline;
pub mod processor;
pub mod stats;

pub use pipeline::{
    AdmissionPipeline, AdmissionResult, DEFAULT_HANDLED_EVENT_TYPE, InboundDelivery,
    PipelineConfig, RejectReason, RetryInfo,
};
pub use processor::{AdmittedEvent, EventProcessor, LoggingProcessor};
pub use stats::{AdmissionStats, StatsSnapshot};
