//! Pool assembly and lifecycle: registry setup, worker spawning, reporter,
//! shutdown signalling.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use fanlog_bus::MessageBus;
use fanlog_common::{ConsumerId, PipelineSettings};

use crate::error::Result;
use crate::metrics::{ProcessedCounter, ThroughputReporter};
use crate::processor::MessageProcessor;
use crate::registry::ConsumerRegistry;
use crate::worker::ConsumerWorker;

/// Owns the shared counter and the shutdown channel, and turns settings into
/// a running pool of workers plus one reporter.
pub struct Coordinator {
    bus: Arc<dyn MessageBus>,
    settings: PipelineSettings,
    counter: Arc<ProcessedCounter>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Coordinator {
    pub fn new(bus: Arc<dyn MessageBus>, settings: PipelineSettings) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            bus,
            settings,
            counter: Arc::new(ProcessedCounter::new()),
            shutdown_tx,
        }
    }

    pub fn counter(&self) -> Arc<ProcessedCounter> {
        self.counter.clone()
    }

    /// One-time durable setup: the consumer group, then the registry. The
    /// benign already-exists conflict is absorbed inside `ensure_group`;
    /// everything else aborts startup before any worker exists.
    pub async fn initialize(&self) -> Result<Vec<ConsumerId>> {
        let registry = ConsumerRegistry::new(self.bus.clone(), &self.settings);
        registry.ensure_group().await?;
        registry.rebuild(self.settings.group_size).await
    }

    /// Subscribes every worker, then spawns the worker loops and the
    /// reporter. Subscriptions are all open before the first loop runs, so
    /// every worker observes every subsequent publish.
    pub async fn start(&self, ids: Vec<ConsumerId>) -> Result<Vec<JoinHandle<()>>> {
        let mut workers = Vec::with_capacity(ids.len());
        for id in ids {
            let processor = MessageProcessor::new(
                self.bus.clone(),
                self.settings.processed_log.clone(),
                self.counter.clone(),
            );
            let worker =
                ConsumerWorker::subscribe(id, &self.settings.channel, self.bus.clone(), processor)
                    .await?;
            workers.push(worker);
        }

        let mut handles = Vec::with_capacity(workers.len() + 1);
        for worker in workers {
            debug!(consumer = %worker.id(), "Spawning worker loop");
            handles.push(tokio::spawn(worker.run(self.shutdown_tx.subscribe())));
        }
        handles.push(ThroughputReporter::spawn(
            self.counter.clone(),
            self.settings.report_interval,
            self.shutdown_tx.subscribe(),
        ));

        info!(
            workers = self.settings.group_size,
            channel = %self.settings.channel,
            "Consumer pool started"
        );
        Ok(handles)
    }

    /// Signals the pool to stop. Workers finish their in-flight message
    /// first; callers await the handles returned by [`start`](Self::start)
    /// to complete the drain.
    pub fn shutdown(&self) {
        info!("Shutting down consumer pool...");
        let _ = self.shutdown_tx.send(());
    }
}
