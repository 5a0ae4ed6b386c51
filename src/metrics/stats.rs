use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use hdrhistogram::Histogram;
use tokio::sync::RwLock;

use crate::transport::TransportError;

/// Publish outcome counters and latency, shared by all workers.
pub struct Stats {
    // Publish latency histogram (microsecond precision)
    latency_hist: RwLock<Histogram<u64>>,

    published: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    malformed: AtomicU64,

    start_time: Instant,
    last_snapshot: RwLock<(Instant, u64)>,
}

impl Stats {
    pub fn new() -> Result<Self> {
        let now = Instant::now();
        Ok(Self {
            // 1us to 60s range, 3 significant digits
            latency_hist: RwLock::new(Histogram::new_with_bounds(1, 60_000_000, 3)?),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            start_time: now,
            last_snapshot: RwLock::new((now, 0)),
        })
    }

    /// Record a publish acknowledged by the transport.
    pub async fn record_published(&self, latency: Duration) {
        self.published.fetch_add(1, Ordering::Relaxed);
        let us = (latency.as_micros() as u64).max(1);
        let _ = self.latency_hist.write().await.record(us);
    }

    /// Record a failed publish. Deadline expiry is tracked on its own.
    pub fn record_failure(&self, err: &TransportError) {
        match err {
            TransportError::Timeout => self.timed_out.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record an intentionally malformed payload (not an error).
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let published = self.published.load(Ordering::Relaxed);

        let (p50, p99, max) = {
            let hist = self.latency_hist.read().await;
            (
                hist.value_at_quantile(0.5),
                hist.value_at_quantile(0.99),
                hist.max(),
            )
        };
        let (interval_duration, interval_published) = {
            let mut last = self.last_snapshot.write().await;
            let since = now.duration_since(last.0);
            let delta = published.saturating_sub(last.1);
            *last = (now, published);
            (since, delta)
        };

        StatsSnapshot {
            published,
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            total_duration: now.duration_since(self.start_time),
            interval_duration,
            interval_published,
            latency_us_p50: p50,
            latency_us_p99: p99,
            latency_us_max: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub published: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub malformed: u64,
    pub total_duration: Duration,
    pub interval_duration: Duration,
    pub interval_published: u64,
    pub latency_us_p50: u64,
    pub latency_us_p99: u64,
    pub latency_us_max: u64,
}

impl StatsSnapshot {
    pub fn total_throughput(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs > 0.0 { self.published as f64 / secs } else { 0.0 }
    }

    pub fn interval_throughput(&self) -> f64 {
        let secs = self.interval_duration.as_secs_f64();
        if secs > 0.0 { self.interval_published as f64 / secs } else { 0.0 }
    }

    /// Emit this snapshot as a structured log line.
    pub fn log(&self, label: &str) {
        tracing::info!(
            published = self.published,
            failed = self.failed,
            timed_out = self.timed_out,
            malformed = self.malformed,
            rate_avg = %format!("{:.2}", self.total_throughput()),
            rate_inst = %format!("{:.2}", self.interval_throughput()),
            p50_us = self.latency_us_p50,
            p99_us = self.latency_us_p99,
            max_us = self.latency_us_max,
            "{}",
            label
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_are_separate() {
        let stats = Stats::new().unwrap();
        stats.record_published(Duration::from_millis(3)).await;
        stats.record_published(Duration::from_millis(5)).await;
        stats.record_failure(&TransportError::Publish("x".into()));
        stats.record_failure(&TransportError::Timeout);
        stats.record_malformed();

        let snap = stats.snapshot().await;
        assert_eq!(snap.published, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.timed_out, 1);
        assert_eq!(snap.malformed, 1);
        assert!(snap.latency_us_max >= 5_000);
    }

    #[tokio::test]
    async fn interval_counts_reset_per_snapshot() {
        let stats = Stats::new().unwrap();
        stats.record_published(Duration::from_micros(10)).await;
        assert_eq!(stats.snapshot().await.interval_published, 1);
        assert_eq!(stats.snapshot().await.interval_published, 0);
        stats.record_published(Duration::from_micros(10)).await;
        let snap = stats.snapshot().await;
        assert_eq!(snap.interval_published, 1);
        assert_eq!(snap.published, 2);
    }

    #[tokio::test]
    async fn latency_recorded_while_histogram_is_read() {
        let stats = std::sync::Arc::new(Stats::new().unwrap());
        let guard = stats.latency_hist.read().await;
        let recorder = tokio::spawn({
            let stats = stats.clone();
            async move { stats.record_published(Duration::from_millis(7)).await }
        });
        tokio::task::yield_now().await;
        drop(guard);
        recorder.await.unwrap();

        let snap = stats.snapshot().await;
        assert_eq!(snap.published, 1);
        assert!(snap.latency_us_max >= 7_000);
    }
}
