//! Durable setup run once at startup: the consumer group on the processed
//! log and the registry of consumer identifiers.

use std::sync::Arc;

use tracing::info;

use fanlog_bus::{BusError, GroupStart, MessageBus};
use fanlog_common::{ConsumerId, PipelineSettings};

use crate::error::Result;

pub struct ConsumerRegistry {
    bus: Arc<dyn MessageBus>,
    log: String,
    group: String,
    registry_key: String,
    consumer_prefix: String,
}

impl ConsumerRegistry {
    pub fn new(bus: Arc<dyn MessageBus>, settings: &PipelineSettings) -> Self {
        Self {
            bus,
            log: settings.processed_log.clone(),
            group: settings.group_name.clone(),
            registry_key: settings.registry_key.clone(),
            consumer_prefix: settings.consumer_prefix.clone(),
        }
    }

    /// Creates the consumer group at the tail of the log, creating the log
    /// itself when absent. A group that already exists is the expected
    /// outcome of a restart and is absorbed here; any other failure
    /// propagates and aborts startup.
    pub async fn ensure_group(&self) -> Result<()> {
        match self
            .bus
            .create_consumer_group(&self.log, &self.group, GroupStart::Tail, true)
            .await
        {
            Ok(()) => {
                info!(log = %self.log, group = %self.group, "Consumer group created");
                Ok(())
            }
            Err(BusError::GroupExists { .. }) => {
                info!(log = %self.log, group = %self.group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Clears the registry and repopulates it with `group_size` identifiers
    /// in index order. Any failure leaves startup aborted; a partially
    /// rebuilt registry is not a state the pipeline runs with.
    pub async fn rebuild(&self, group_size: usize) -> Result<Vec<ConsumerId>> {
        self.bus.delete_key(&self.registry_key).await?;

        let mut ids = Vec::with_capacity(group_size);
        for index in 0..group_size {
            let id = ConsumerId::new(&self.consumer_prefix, index);
            self.bus
                .append_to_list(&self.registry_key, id.as_str())
                .await?;
            ids.push(id);
        }
        info!(count = ids.len(), key = %self.registry_key, "Consumer registry rebuilt");
        Ok(ids)
    }

    /// Registered identifiers in registration order.
    pub async fn current(&self) -> Result<Vec<ConsumerId>> {
        let values = self.bus.read_list(&self.registry_key).await?;
        Ok(values.into_iter().map(ConsumerId::from).collect())
    }
}
