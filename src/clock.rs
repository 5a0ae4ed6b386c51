//! Simulated event clock: advances one hour of event time per wall-clock second.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

/// Wall-clock period between ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
/// Simulated seconds added per tick.
pub const TICK_STEP_SECS: i64 = 3_600;

/// Shared, read-only view of the simulated clock.
///
/// Cloning is cheap; every clone observes the same value. Only the ticker
/// spawned by [`SimClock::start`] writes to it.
#[derive(Clone, Debug)]
pub struct SimClock {
    unix_secs: Arc<AtomicI64>,
}

impl SimClock {
    /// Start the clock at the current wall-clock time and spawn its ticker.
    pub fn start(token: CancellationToken) -> (Self, JoinHandle<()>) {
        Self::start_at(chrono::Utc::now().timestamp(), token)
    }

    /// Start the clock at an explicit Unix time and spawn its ticker.
    pub fn start_at(unix_secs: i64, token: CancellationToken) -> (Self, JoinHandle<()>) {
        let clock = Self::frozen_at(unix_secs);
        let writer = clock.clone();
        let handle = tokio::spawn(async move { writer.tick_forever(token).await });
        (clock, handle)
    }

    /// A clock that never advances. Useful when no ticker should run.
    pub fn frozen_at(unix_secs: i64) -> Self {
        Self {
            unix_secs: Arc::new(AtomicI64::new(unix_secs)),
        }
    }

    /// Current simulated time in Unix seconds.
    pub fn now_unix(&self) -> i64 {
        self.unix_secs.load(Ordering::Acquire)
    }

    fn advance(&self) {
        self.unix_secs.fetch_add(TICK_STEP_SECS, Ordering::AcqRel);
    }

    async fn tick_forever(self, token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.advance();
                    tracing::trace!(event_time = self.now_unix(), "simulated clock advanced");
                }
            }
        }
        tracing::debug!("simulated clock stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: i64 = 1_700_000_000;

    #[test]
    fn frozen_clock_does_not_move() {
        let clock = SimClock::frozen_at(START);
        assert_eq!(clock.now_unix(), START);
        assert_eq!(clock.clone().now_unix(), START);
    }

    #[test]
    fn advance_adds_one_hour() {
        let clock = SimClock::frozen_at(START);
        clock.advance();
        clock.advance();
        assert_eq!(clock.now_unix(), START + 2 * TICK_STEP_SECS);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_advances_an_hour_per_second() {
        let token = CancellationToken::new();
        let (clock, handle) = SimClock::start_at(START, token.clone());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(clock.now_unix(), START);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let hours = (clock.now_unix() - START) / TICK_STEP_SECS;
        assert!((9..=11).contains(&hours), "advanced {hours} hours");

        token.cancel();
        handle.await.expect("ticker task");
    }

    #[tokio::test(start_paused = true)]
    async fn clock_is_monotonic_for_readers() {
        let token = CancellationToken::new();
        let (clock, handle) = SimClock::start_at(START, token.clone());
        let mut last = clock.now_unix();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(250)).await;
            let now = clock.now_unix();
            assert!(now >= last);
            last = now;
        }
        token.cancel();
        handle.await.expect("ticker task");
    }
}
