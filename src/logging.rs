// Tracing setup
use anyhow::{Result, anyhow};

/// Install the global fmt subscriber. `level` is any `EnvFilter` directive,
/// e.g. `info` or `mq_faker=debug,rumqttc=warn`.
pub fn init(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
