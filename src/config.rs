//! Fixed deployment constants and the resolved runtime configuration.

use std::time::Duration;

use crate::payload::DEFAULT_FAULT_ODDS;
use crate::topic::PublishSettings;
use crate::worker::{DEFAULT_PUBLISH_TIMEOUT, WorkerConfig};

pub const DEFAULT_PROJECT: &str = "jinked-home";
pub const DEFAULT_TOPIC: &str = "pd-demo";
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_DELAY_THRESHOLD: Duration = Duration::from_secs(1);
pub const DEFAULT_COUNT_THRESHOLD: usize = 100;
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub topic: String,
    pub workers: usize,
    pub publish_settings: PublishSettings,
    pub worker: WorkerConfig,
    /// Fault-injection odds (`1 / fault_odds`); `0` disables injection.
    pub fault_odds: u32,
    pub snapshot_interval: Duration,
    /// Cancel workers and wait for their in-flight publish on shutdown.
    pub graceful: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            workers: DEFAULT_WORKERS,
            publish_settings: PublishSettings {
                delay_threshold: DEFAULT_DELAY_THRESHOLD,
                count_threshold: DEFAULT_COUNT_THRESHOLD,
            },
            worker: WorkerConfig {
                publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
                rate: None,
                max_iterations: None,
            },
            fault_odds: DEFAULT_FAULT_ODDS,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            graceful: false,
        }
    }
}
