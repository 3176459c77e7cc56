//! Engine configuration.

use std::time::Duration;

/// Orchestration engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between polls of an in-flight generation job.
    pub poll_interval: Duration,
    /// Overall deadline for polling one job before the poller gives up and
    /// leaves the segment for an explicit operator retry.
    pub max_poll_duration: Duration,
    /// Consecutive `ProviderUnavailable` polls tolerated before giving up.
    pub max_unavailable_polls: u32,
    /// Backoff cap between retries after unavailable polls.
    pub max_backoff: Duration,
    /// Spawn background pollers on job submission.
    pub auto_poll: bool,
    /// Expiry for presigned image URLs handed to the generation provider.
    pub image_url_expiry: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_duration: Duration::from_secs(30 * 60),
            max_unavailable_polls: 8,
            max_backoff: Duration::from_secs(60),
            auto_poll: true,
            image_url_expiry: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.poll_interval.as_secs()),
            ),
            max_poll_duration: Duration::from_secs(
                std::env::var("MAX_POLL_DURATION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.max_poll_duration.as_secs()),
            ),
            max_unavailable_polls: std::env::var("MAX_UNAVAILABLE_POLLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_unavailable_polls),
            max_backoff: defaults.max_backoff,
            auto_poll: std::env::var("AUTO_POLL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.auto_poll),
            image_url_expiry: defaults.image_url_expiry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_unavailable_polls, 8);
        assert!(config.auto_poll);
    }
}
