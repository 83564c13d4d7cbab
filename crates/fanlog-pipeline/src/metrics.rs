//! Processed-message accounting and the periodic throughput report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Count of messages processed since startup, shared by every worker.
///
/// The coordinator owns one instance and injects it into each processor;
/// nothing in the pipeline reaches for global state.
pub struct ProcessedCounter {
    processed: AtomicU64,
    started_at: Instant,
}

impl ProcessedCounter {
    pub fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Records one successfully processed message.
    pub fn record(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Messages per second over the counter's lifetime, or `None` while no
    /// whole second has elapsed yet.
    pub fn throughput(&self) -> Option<f64> {
        Self::rate(self.processed(), self.started_at.elapsed().as_secs())
    }

    /// Administrative override, kept off the processing path. Normal
    /// processing only ever moves the counter forward through
    /// [`record`](Self::record).
    pub fn override_processed(&self, value: u64) {
        self.processed.store(value, Ordering::SeqCst);
    }

    fn rate(processed: u64, elapsed_secs: u64) -> Option<f64> {
        if elapsed_secs == 0 {
            return None;
        }
        Some(processed as f64 / elapsed_secs as f64)
    }
}

impl Default for ProcessedCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that samples the shared counter on a fixed period and
/// logs the running rate.
pub struct ThroughputReporter;

impl ThroughputReporter {
    pub fn spawn(
        counter: Arc<ProcessedCounter>,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // the interval's immediate first tick lands in the
                        // None arm, nothing is reported for elapsed == 0
                        match counter.throughput() {
                            Some(rate) => info!("Messages processed per second: {:.2}", rate),
                            None => debug!("No full second elapsed yet, skipping rate report"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Throughput reporter shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_monotonic() {
        let counter = ProcessedCounter::new();
        assert_eq!(counter.processed(), 0);

        counter.record();
        counter.record();
        assert_eq!(counter.processed(), 2);
    }

    #[test]
    fn test_override_is_the_only_way_down() {
        let counter = ProcessedCounter::new();
        counter.record();
        counter.record();

        counter.override_processed(0);
        assert_eq!(counter.processed(), 0);

        counter.override_processed(41);
        counter.record();
        assert_eq!(counter.processed(), 42);
    }

    #[test]
    fn test_rate_undefined_within_first_second() {
        assert_eq!(ProcessedCounter::rate(500, 0), None);

        let counter = ProcessedCounter::new();
        counter.record();
        assert_eq!(counter.throughput(), None);
    }

    #[test]
    fn test_rate_is_count_over_whole_seconds() {
        assert_eq!(ProcessedCounter::rate(6, 3), Some(2.0));
        assert_eq!(ProcessedCounter::rate(0, 10), Some(0.0));
        assert_eq!(ProcessedCounter::rate(1, 3), Some(1.0 / 3.0));
    }

    #[test]
    fn test_rate_formats_with_two_decimals() {
        let rate = ProcessedCounter::rate(1, 3).unwrap();
        let line = format!("Messages processed per second: {:.2}", rate);
        assert_eq!(line, "Messages processed per second: 0.33");
    }
}
