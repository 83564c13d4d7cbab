//! Fanlog Consumer Pool
//!
//! Subscribes a pool of workers to the broadcast channel and records every
//! received message, stamped with provenance, into the durable processed
//! log. Each worker persists its own copy, so a pool of N workers yields N
//! log entries per published message.
//!
//! Usage: `fanlog-consumer <group-size>`
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FANLOG_REDIS_URL` | `redis://127.0.0.1:6379` | Bus server address |
//! | `FANLOG_CHANNEL` | `messages:published` | Broadcast channel |
//! | `FANLOG_PROCESSED_LOG` | `messages:processed` | Durable append log |
//! | `FANLOG_GROUP_NAME` | `message_consumers` | Consumer group on the log |
//! | `FANLOG_REGISTRY_KEY` | `consumer:ids` | Consumer registry list key |
//! | `FANLOG_CONSUMER_PREFIX` | `consumer_` | Consumer identifier prefix |
//! | `FANLOG_REPORT_INTERVAL_SECS` | `3` | Throughput report period |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fanlog_bus::RedisBus;
use fanlog_common::PipelineSettings;
use fanlog_pipeline::Coordinator;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// The single positional argument: the number of consumer workers.
/// Rejects anything that is not exactly one positive integer.
fn parse_group_size<I: Iterator<Item = String>>(mut args: I) -> Option<usize> {
    let raw = args.next()?;
    if args.next().is_some() {
        return None;
    }
    raw.parse().ok().filter(|n| *n > 0)
}

fn load_settings(group_size: usize) -> PipelineSettings {
    let defaults = PipelineSettings::default();
    PipelineSettings {
        channel: env_or("FANLOG_CHANNEL", &defaults.channel),
        processed_log: env_or("FANLOG_PROCESSED_LOG", &defaults.processed_log),
        group_name: env_or("FANLOG_GROUP_NAME", &defaults.group_name),
        registry_key: env_or("FANLOG_REGISTRY_KEY", &defaults.registry_key),
        consumer_prefix: env_or("FANLOG_CONSUMER_PREFIX", &defaults.consumer_prefix),
        group_size,
        report_interval: Duration::from_secs(env_or_parse("FANLOG_REPORT_INTERVAL_SECS", 3)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // validate the argument before anything is allocated or connected
    let group_size = match parse_group_size(std::env::args().skip(1)) {
        Some(n) => n,
        None => {
            eprintln!("Usage: fanlog-consumer <group-size>");
            eprintln!("  group-size: number of consumer workers, a positive integer");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!(group_size, "Starting Fanlog consumer pool");

    let settings = load_settings(group_size);
    let redis_url = env_or("FANLOG_REDIS_URL", "redis://127.0.0.1:6379");
    let bus = Arc::new(RedisBus::connect(&redis_url)?);
    info!(url = %redis_url, "Bus client ready");

    let coordinator = Coordinator::new(bus, settings);

    // fail fast: a broken bus must surface here, not in a worker
    let ids = coordinator.initialize().await?;
    info!(consumers = ids.len(), "Consumer group and registry initialized");

    let handles = coordinator.start(ids).await?;

    info!("Consumer pool running. Press Ctrl+C to shut down.");
    shutdown_signal().await;
    info!("Shutdown signal received...");

    coordinator.shutdown();
    let drain = async {
        for handle in handles {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(Duration::from_secs(30), drain)
        .await
        .is_err()
    {
        warn!("Drain timed out, exiting with workers still running");
    }

    info!("Consumer pool shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_group_size_accepts_positive_integers() {
        assert_eq!(parse_group_size(args(&["3"])), Some(3));
        assert_eq!(parse_group_size(args(&["1"])), Some(1));
    }

    #[test]
    fn test_group_size_rejects_garbage() {
        assert_eq!(parse_group_size(args(&[])), None);
        assert_eq!(parse_group_size(args(&["0"])), None);
        assert_eq!(parse_group_size(args(&["-2"])), None);
        assert_eq!(parse_group_size(args(&["three"])), None);
        assert_eq!(parse_group_size(args(&["3", "extra"])), None);
    }
}
