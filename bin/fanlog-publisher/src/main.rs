//! Fanlog Publisher
//!
//! Load generator for a running consumer pool: publishes batches of
//! `{"message_id": "<uuid>"}` payloads to the broadcast channel for a
//! bounded duration, with a randomized pause between batches.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FANLOG_REDIS_URL` | `redis://127.0.0.1:6379` | Bus server address |
//! | `FANLOG_CHANNEL` | `messages:published` | Broadcast channel |
//! | `FANLOG_PUBLISH_SECS` | `60` | How long to keep publishing |
//! | `FANLOG_BATCH_SIZE` | `1000` | Messages per batch |
//! | `RUST_LOG` | `info` | Log level |

use std::time::{Duration, Instant};

use anyhow::Result;
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fanlog_bus::{MessageBus, RedisBus};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let redis_url = env_or("FANLOG_REDIS_URL", "redis://127.0.0.1:6379");
    let channel = env_or("FANLOG_CHANNEL", "messages:published");
    let run_for = Duration::from_secs(env_or_parse("FANLOG_PUBLISH_SECS", 60));
    let batch_size: usize = env_or_parse("FANLOG_BATCH_SIZE", 1000);

    let bus = RedisBus::connect(&redis_url)?;
    info!(url = %redis_url, channel = %channel, batch_size, "Publisher starting");

    let started = Instant::now();
    let mut published: u64 = 0;

    while started.elapsed() < run_for {
        for _ in 0..batch_size {
            let payload =
                serde_json::json!({ "message_id": uuid::Uuid::new_v4().to_string() }).to_string();
            bus.publish(&channel, &payload).await?;
            published += 1;
        }
        info!(batch = batch_size, total = published, "Batch published");

        let pause_ms = rand::thread_rng().gen_range(100..=200);
        tokio::time::sleep(Duration::from_millis(pause_ms)).await;
    }

    info!(
        total = published,
        elapsed_secs = started.elapsed().as_secs(),
        "Publishing finished"
    );
    Ok(())
}
