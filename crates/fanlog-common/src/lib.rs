use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Message Fields
// ============================================================================

/// Field holding the raw payload as received from the broadcast channel
pub const RAW_MESSAGE_FIELD: &str = "message";

/// Field stamped with the identifier of the worker that processed the message
pub const PROCESSED_BY_FIELD: &str = "processed_by";

/// Field stamped with the ISO-8601 timestamp of the processing moment
pub const PROCESSING_TIME_FIELD: &str = "processing_time";

// ============================================================================
// Core Message Type
// ============================================================================

/// A message flowing through the pipeline: an unordered set of string fields.
///
/// Workers build one per received payload and the processor mutates it in
/// place to add provenance before it is appended to the durable log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    fields: HashMap<String, String>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a raw payload under the [`RAW_MESSAGE_FIELD`] key.
    pub fn from_payload(payload: impl Into<String>) -> Self {
        let mut message = Self::new();
        message.set(RAW_MESSAGE_FIELD, payload);
        message
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Consumer Identity
// ============================================================================

/// Identifier of one consumer slot, unique within the active pool.
///
/// Formatted as `<prefix><index>`, e.g. `consumer_0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(String);

impl ConsumerId {
    pub fn new(prefix: &str, index: usize) -> Self {
        Self(format!("{}{}", prefix, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConsumerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Key material and pool sizing for one consumer pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Broadcast channel the workers subscribe to
    pub channel: String,
    /// Durable append log for processed messages
    pub processed_log: String,
    /// Consumer group created on the processed log
    pub group_name: String,
    /// List key holding the registered consumer identifiers
    pub registry_key: String,
    /// Prefix for generated consumer identifiers
    pub consumer_prefix: String,
    /// Number of concurrent consumer workers
    pub group_size: usize,
    /// Sampling period of the throughput reporter
    pub report_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            channel: "messages:published".to_string(),
            processed_log: "messages:processed".to_string(),
            group_name: "message_consumers".to_string(),
            registry_key: "consumer:ids".to_string(),
            consumer_prefix: "consumer_".to_string(),
            group_size: 1,
            report_interval: Duration::from_secs(3),
        }
    }
}
