//! The consumer worker: one dedicated subscription and its receive loop.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use fanlog_bus::{ChannelMessage, MessageBus, Subscription};
use fanlog_common::{ConsumerId, Message};

use crate::error::Result;
use crate::processor::MessageProcessor;

/// One pool slot. Holds its own subscription for its whole lifetime and
/// processes messages strictly one at a time.
///
/// Every worker receives its own copy of each published message, so a pool
/// of N workers persists N entries per publish. That duplication is the
/// intended fan-out behavior.
pub struct ConsumerWorker {
    id: ConsumerId,
    channel: String,
    subscription: Subscription,
    processor: MessageProcessor,
}

impl ConsumerWorker {
    /// Opens the worker's subscription. A worker that cannot subscribe never
    /// enters the pool; the caller treats this as a startup failure.
    pub async fn subscribe(
        id: ConsumerId,
        channel: &str,
        bus: Arc<dyn MessageBus>,
        processor: MessageProcessor,
    ) -> Result<Self> {
        let subscription = bus.subscribe(channel).await?;
        info!(consumer = %id, channel = %channel, "Worker subscribed");
        Ok(Self {
            id,
            channel: channel.to_string(),
            subscription,
            processor,
        })
    }

    pub fn id(&self) -> &ConsumerId {
        &self.id
    }

    /// Receive loop. Runs until the subscription closes or shutdown is
    /// signalled. Shutdown races only the receipt of the next message; a
    /// message already being processed always runs to completion.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                received = self.subscription.next() => {
                    match received {
                        Some(message) => self.handle(message).await,
                        None => {
                            warn!(consumer = %self.id, "Subscription closed, worker stopping");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!(consumer = %self.id, "Worker shutting down");
                    break;
                }
            }
        }
    }

    async fn handle(&self, received: ChannelMessage) {
        if received.channel != self.channel {
            debug!(
                consumer = %self.id,
                channel = %received.channel,
                "Ignoring message from unexpected channel"
            );
            return;
        }

        let message = Message::from_payload(received.payload);
        // a failed message is dropped for this worker only, the loop goes on
        if let Err(e) = self.processor.process(message, &self.id).await {
            warn!(consumer = %self.id, error = %e, "Processing failed, message dropped");
        }
    }
}
