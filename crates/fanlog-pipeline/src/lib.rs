//! Fanlog consumer pipeline
//!
//! Fans broadcast messages out to a pool of consumer workers and records
//! each worker's processed copy in a durable append log:
//! - ConsumerRegistry: idempotent consumer-group setup and the registry of
//!   consumer identifiers
//! - MessageProcessor: provenance stamping and the durable append
//! - ConsumerWorker: one subscription and receive loop per pool slot
//! - ProcessedCounter / ThroughputReporter: shared counter and the periodic
//!   rate report
//! - Coordinator: wires the above together and owns the shutdown signal

pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod processor;
pub mod registry;
pub mod worker;

pub use coordinator::Coordinator;
pub use error::{PipelineError, Result};
pub use metrics::{ProcessedCounter, ThroughputReporter};
pub use processor::MessageProcessor;
pub use registry::ConsumerRegistry;
pub use worker::ConsumerWorker;
