use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Optional per-worker pacing. Workers run unthrottled unless one is configured.
pub struct RateController {
    interval: Duration,
    last_send: Option<Instant>,
}

impl RateController {
    /// Pace to `msgs_per_second`. Returns `None` for non-positive or non-finite rates.
    pub fn new(msgs_per_second: f64) -> Option<Self> {
        if !msgs_per_second.is_finite() || msgs_per_second <= 0.0 {
            return None;
        }
        Some(Self {
            interval: Duration::from_secs_f64(1.0 / msgs_per_second),
            last_send: None,
        })
    }

    /// Wait until it's time to send the next message
    pub async fn wait_for_next(&mut self) {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        self.last_send = Some(Instant::now());
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
