use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::warn;

use fanlog_common::Message;

use crate::error::{BusError, Result};
use crate::{ChannelMessage, GroupStart, MessageBus, Subscription};

const CHANNEL_CAPACITY: usize = 1024;

/// One persisted entry of an in-memory append log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    pub message: Message,
}

/// In-process bus with the same contract as [`crate::RedisBus`]: broadcast
/// channels for fan-out, vectors for append logs and lists, a name set for
/// consumer groups. Entry ids follow the `<unix-ms>-<seq>` shape of real
/// stream ids.
///
/// Backs the test suite and local development runs. The inherent methods
/// ([`entries`](MemoryBus::entries), [`groups`](MemoryBus::groups),
/// [`contains_log`](MemoryBus::contains_log)) allow tests to inspect state
/// the trait deliberately does not expose.
#[derive(Default)]
pub struct MemoryBus {
    channels: DashMap<String, broadcast::Sender<String>>,
    logs: DashMap<String, Vec<LogEntry>>,
    groups: DashMap<String, Vec<String>>,
    lists: DashMap<String, Vec<String>>,
    sequence: AtomicU64,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn next_entry_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", millis, seq)
    }

    /// Entries of a log in append order; absent log reads as empty.
    pub fn entries(&self, log: &str) -> Vec<LogEntry> {
        self.logs.get(log).map(|e| e.clone()).unwrap_or_default()
    }

    /// Consumer groups created on a log.
    pub fn groups(&self, log: &str) -> Vec<String> {
        self.groups.get(log).map(|g| g.clone()).unwrap_or_default()
    }

    pub fn contains_log(&self, log: &str) -> bool {
        self.logs.contains_key(log)
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        // send fails only when nobody is subscribed; fan-out drops it then
        let _ = self.sender(channel).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let receiver = self.sender(channel).subscribe();
        let name = channel.to_string();
        let stream = futures::stream::unfold((receiver, name), |(mut rx, name)| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => {
                        let message = ChannelMessage {
                            channel: name.clone(),
                            payload,
                        };
                        return Some((message, (rx, name)));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %name, skipped, "subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Subscription::new(stream))
    }

    async fn append(&self, log: &str, message: &Message) -> Result<String> {
        let id = self.next_entry_id();
        let entry = LogEntry {
            id: id.clone(),
            message: message.clone(),
        };
        self.logs.entry(log.to_string()).or_default().push(entry);
        Ok(id)
    }

    async fn create_consumer_group(
        &self,
        log: &str,
        group: &str,
        _start: GroupStart,
        create_log_if_missing: bool,
    ) -> Result<()> {
        if !create_log_if_missing && !self.logs.contains_key(log) {
            return Err(BusError::Command(format!("no such log '{}'", log)));
        }
        self.logs.entry(log.to_string()).or_default();
        let mut groups = self.groups.entry(log.to_string()).or_default();
        if groups.iter().any(|g| g == group) {
            return Err(BusError::GroupExists {
                log: log.to_string(),
                group: group.to_string(),
            });
        }
        groups.push(group.to_string());
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.channels.remove(key);
        self.logs.remove(key);
        self.groups.remove(key);
        self.lists.remove(key);
        Ok(())
    }

    async fn append_to_list(&self, key: &str, value: &str) -> Result<()> {
        self.lists
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn read_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.lists.get(key).map(|v| v.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_fans_out_to_every_subscription() {
        let bus = MemoryBus::new();
        let mut first = bus.subscribe("events").await.unwrap();
        let mut second = bus.subscribe("events").await.unwrap();

        bus.publish("events", "hello").await.unwrap();

        let a = first.next().await.unwrap();
        let b = second.next().await.unwrap();
        assert_eq!(a.payload, "hello");
        assert_eq!(b.payload, "hello");
        assert_eq!(a.channel, "events");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = MemoryBus::new();
        bus.publish("events", "nobody listening").await.unwrap();
    }

    #[tokio::test]
    async fn test_messages_published_before_subscribing_are_not_delivered() {
        let bus = MemoryBus::new();
        bus.publish("events", "early").await.unwrap();

        let mut sub = bus.subscribe("events").await.unwrap();
        bus.publish("events", "late").await.unwrap();

        assert_eq!(sub.next().await.unwrap().payload, "late");
    }

    #[tokio::test]
    async fn test_append_generates_increasing_entry_ids() {
        let bus = MemoryBus::new();
        let first = bus
            .append("log", &Message::from_payload("a"))
            .await
            .unwrap();
        let second = bus
            .append("log", &Message::from_payload("b"))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(bus.entries("log").len(), 2);
        assert_eq!(bus.entries("log")[0].id, first);
    }

    #[tokio::test]
    async fn test_group_creation_is_rejected_when_already_present() {
        let bus = MemoryBus::new();
        bus.create_consumer_group("log", "readers", GroupStart::Tail, true)
            .await
            .unwrap();

        let err = bus
            .create_consumer_group("log", "readers", GroupStart::Tail, true)
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::GroupExists { .. }));
        assert_eq!(bus.groups("log"), vec!["readers".to_string()]);
    }

    #[tokio::test]
    async fn test_group_creation_makes_the_log_when_asked_to() {
        let bus = MemoryBus::new();
        assert!(!bus.contains_log("log"));

        bus.create_consumer_group("log", "readers", GroupStart::Beginning, true)
            .await
            .unwrap();
        assert!(bus.contains_log("log"));
    }

    #[tokio::test]
    async fn test_group_creation_without_mkstream_requires_the_log() {
        let bus = MemoryBus::new();
        let err = bus
            .create_consumer_group("absent", "readers", GroupStart::Tail, false)
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Command(_)));
    }

    #[tokio::test]
    async fn test_lists_preserve_insertion_order_and_delete_clears() {
        let bus = MemoryBus::new();
        bus.append_to_list("ids", "a").await.unwrap();
        bus.append_to_list("ids", "b").await.unwrap();
        assert_eq!(bus.read_list("ids").await.unwrap(), vec!["a", "b"]);

        bus.delete_key("ids").await.unwrap();
        assert!(bus.read_list("ids").await.unwrap().is_empty());
    }
}
