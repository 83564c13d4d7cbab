//! Per-message processing: provenance stamping and the durable append.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use fanlog_bus::MessageBus;
use fanlog_common::{ConsumerId, Message, PROCESSED_BY_FIELD, PROCESSING_TIME_FIELD};

use crate::error::Result;
use crate::metrics::ProcessedCounter;

/// Stamps a message with the processing worker's identity and timestamp,
/// then appends it to the processed log.
///
/// The counter moves only after the append has succeeded; a failed append
/// leaves it untouched and surfaces the error to the calling worker.
#[derive(Clone)]
pub struct MessageProcessor {
    bus: Arc<dyn MessageBus>,
    log: String,
    counter: Arc<ProcessedCounter>,
}

impl MessageProcessor {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        log: impl Into<String>,
        counter: Arc<ProcessedCounter>,
    ) -> Self {
        Self {
            bus,
            log: log.into(),
            counter,
        }
    }

    pub async fn process(&self, mut message: Message, consumer: &ConsumerId) -> Result<()> {
        message.set(PROCESSED_BY_FIELD, consumer.as_str());
        message.set(
            PROCESSING_TIME_FIELD,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        let entry_id = self.bus.append(&self.log, &message).await?;
        self.counter.record();
        debug!(consumer = %consumer, entry_id = %entry_id, "Message appended");
        Ok(())
    }
}
