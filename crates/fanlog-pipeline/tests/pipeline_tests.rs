//! End-to-end pool behavior over the in-memory bus.
//!
//! Drives the Coordinator exactly the way the consumer binary does:
//! initialize, start, publish, shutdown, drain.

use std::sync::Arc;
use std::time::Duration;

use fanlog_bus::{MemoryBus, MessageBus};
use fanlog_common::{PipelineSettings, PROCESSED_BY_FIELD, PROCESSING_TIME_FIELD};
use fanlog_pipeline::Coordinator;

fn settings_with_pool(group_size: usize) -> PipelineSettings {
    PipelineSettings {
        group_size,
        ..PipelineSettings::default()
    }
}

/// Polls until the shared counter reaches `expected` processed messages.
/// The counter is incremented after the append, so once it reads `expected`
/// the same number of entries is already durable.
async fn wait_for_processed(coordinator: &Coordinator, expected: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while coordinator.counter().processed() < expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} processed messages, have {}",
            expected,
            coordinator.counter().processed()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_every_worker_persists_every_published_message() {
    let bus = Arc::new(MemoryBus::new());
    let settings = settings_with_pool(3);
    let coordinator = Coordinator::new(bus.clone(), settings.clone());

    let ids = coordinator.initialize().await.unwrap();
    assert_eq!(ids.len(), 3);
    let handles = coordinator.start(ids).await.unwrap();

    bus.publish(&settings.channel, r#"{"message_id":"m-1"}"#)
        .await
        .unwrap();
    wait_for_processed(&coordinator, 3).await;

    let entries = bus.entries(&settings.processed_log);
    assert_eq!(entries.len(), 3, "one persisted copy per worker");

    let mut processed_by: Vec<String> = entries
        .iter()
        .map(|e| e.message.get(PROCESSED_BY_FIELD).unwrap().to_string())
        .collect();
    processed_by.sort();
    assert_eq!(processed_by, vec!["consumer_0", "consumer_1", "consumer_2"]);

    for entry in &entries {
        assert_eq!(
            entry.message.get("message"),
            Some(r#"{"message_id":"m-1"}"#)
        );
        let stamp = entry.message.get(PROCESSING_TIME_FIELD).unwrap();
        chrono::DateTime::parse_from_rfc3339(stamp).expect("stamp must parse as ISO-8601");
    }

    coordinator.shutdown();
    for handle in handles {
        handle.await.unwrap();
    }

    // fully drained: a publish after the join must go nowhere
    bus.publish(&settings.channel, "late").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bus.entries(&settings.processed_log).len(), 3);
}

#[tokio::test]
async fn test_initialize_prepares_group_and_registry() {
    let bus = Arc::new(MemoryBus::new());
    let settings = settings_with_pool(2);
    let coordinator = Coordinator::new(bus.clone(), settings.clone());

    let ids = coordinator.initialize().await.unwrap();

    assert!(bus.contains_log(&settings.processed_log));
    assert_eq!(
        bus.groups(&settings.processed_log),
        vec![settings.group_name.clone()]
    );
    assert_eq!(
        bus.read_list(&settings.registry_key).await.unwrap(),
        vec!["consumer_0", "consumer_1"]
    );

    // a restart reruns initialization without complaint
    let again = coordinator.initialize().await.unwrap();
    assert_eq!(again, ids);
    assert_eq!(bus.groups(&settings.processed_log).len(), 1);
}

#[tokio::test]
async fn test_publishes_before_start_are_not_delivered() {
    let bus = Arc::new(MemoryBus::new());
    let settings = settings_with_pool(2);
    let coordinator = Coordinator::new(bus.clone(), settings.clone());

    bus.publish(&settings.channel, "before anyone listens")
        .await
        .unwrap();

    let ids = coordinator.initialize().await.unwrap();
    let handles = coordinator.start(ids).await.unwrap();

    bus.publish(&settings.channel, "after").await.unwrap();
    wait_for_processed(&coordinator, 2).await;

    let entries = bus.entries(&settings.processed_log);
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.message.get("message"), Some("after"));
    }

    coordinator.shutdown();
    for handle in handles {
        handle.await.unwrap();
    }
}
