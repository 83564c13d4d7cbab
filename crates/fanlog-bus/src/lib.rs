//! Message bus collaborator for the fanlog pipeline.
//!
//! The pipeline talks to its transport through the [`MessageBus`] trait:
//! fan-out pub/sub channels, a durable append log with consumer groups, and
//! plain list storage for the consumer registry. Two backends are provided:
//! - [`RedisBus`]: pub/sub + streams + lists over a connection pool
//! - [`MemoryBus`]: in-process backend for tests and local development

pub mod error;
pub mod memory;
pub mod redis;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use fanlog_common::Message;

pub use error::{BusError, Result};
pub use memory::{LogEntry, MemoryBus};
pub use redis::RedisBus;

/// Where a newly created consumer group starts reading the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStart {
    /// Only entries appended after creation are delivered.
    Tail,
    /// The group observes the log from its first entry.
    Beginning,
}

impl GroupStart {
    pub fn entry_id(&self) -> &'static str {
        match self {
            GroupStart::Tail => "$",
            GroupStart::Beginning => "0",
        }
    }
}

/// A message delivered on a fan-out channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub channel: String,
    pub payload: String,
}

/// A live fan-out subscription.
///
/// Every subscription receives its own copy of each message published to the
/// channel after the subscription was opened. There is no acknowledgement and
/// no replay. The stream ends when the underlying connection closes.
pub struct Subscription {
    inner: Pin<Box<dyn Stream<Item = ChannelMessage> + Send + Sync>>,
}

impl Subscription {
    pub fn new(stream: impl Stream<Item = ChannelMessage> + Send + Sync + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Waits for the next message; `None` once the subscription has closed.
    pub async fn next(&mut self) -> Option<ChannelMessage> {
        self.inner.next().await
    }
}

/// Transport seam between the pipeline and its bus.
///
/// Implementations must be safe to share behind an `Arc`: every call acquires
/// whatever connection it needs and releases it before returning, so
/// concurrent workers never contend on a shared connection.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a payload to a fan-out channel. Delivering to zero
    /// subscribers is not an error.
    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;

    /// Opens a dedicated subscription to a fan-out channel.
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;

    /// Appends a message to the durable log, returning the generated
    /// entry id.
    async fn append(&self, log: &str, message: &Message) -> Result<String>;

    /// Creates a consumer group on the log. Returns
    /// [`BusError::GroupExists`] when the group is already present so
    /// callers can treat the conflict as success. With
    /// `create_log_if_missing` the log itself is created when absent;
    /// without it, a missing log is a command failure.
    async fn create_consumer_group(
        &self,
        log: &str,
        group: &str,
        start: GroupStart,
        create_log_if_missing: bool,
    ) -> Result<()>;

    /// Removes a key of any kind. Deleting an absent key is a no-op.
    async fn delete_key(&self, key: &str) -> Result<()>;

    /// Appends a value to the tail of a list, creating it when absent.
    async fn append_to_list(&self, key: &str, value: &str) -> Result<()>;

    /// Reads a whole list in insertion order; absent key reads as empty.
    async fn read_list(&self, key: &str) -> Result<Vec<String>>;
}
