//! Workflow configuration.

use super::retry::RetryBackoff;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest accepted worker count.
pub const MIN_WORKER_COUNT: usize = 2;

/// Smallest accepted retry ceiling.
pub const MIN_MAX_RETRY: u32 = 1;

/// Smallest accepted task channel capacity multiplier.
pub const MIN_CAPACITY_MULTIPLIER: usize = 1;

/// What to do when stalled workers leave the result set incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallPolicy {
    /// Fail the run with [`WorkflowError::Incomplete`](crate::errors::WorkflowError::Incomplete).
    #[default]
    Abort,
    /// Return whatever completed; the report says what is missing.
    Degrade,
}

/// Configuration for one workflow. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Failed attempts re-enqueued per item before the sentinel is recorded.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// Deadline for a single handler attempt, in milliseconds.
    #[serde(default)]
    pub item_timeout_ms: Option<u64>,
    /// How long an idle worker waits for work before giving up.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Task channel capacity as a multiple of the worker count.
    #[serde(default = "default_capacity_multiplier")]
    pub capacity_multiplier: usize,
    /// Reaction to stalled workers.
    #[serde(default)]
    pub stall_policy: StallPolicy,
    /// Delay between a failure and its re-enqueue.
    #[serde(default)]
    pub retry_backoff: RetryBackoff,
}

fn default_worker_count() -> usize {
    5
}

fn default_max_retry() -> u32 {
    3
}

fn default_idle_timeout_ms() -> u64 {
    10_000
}

fn default_capacity_multiplier() -> usize {
    100
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_retry: default_max_retry(),
            item_timeout_ms: None,
            idle_timeout_ms: default_idle_timeout_ms(),
            capacity_multiplier: default_capacity_multiplier(),
            stall_policy: StallPolicy::default(),
            retry_backoff: RetryBackoff::default(),
        }
    }
}

impl WorkflowConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::new("config", e.to_string()))
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Sets the retry ceiling.
    #[must_use]
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the capacity multiplier.
    #[must_use]
    pub fn with_capacity_multiplier(mut self, multiplier: usize) -> Self {
        self.capacity_multiplier = multiplier;
        self
    }

    /// Sets the stall policy.
    #[must_use]
    pub fn with_stall_policy(mut self, policy: StallPolicy) -> Self {
        self.stall_policy = policy;
        self
    }

    /// Sets the retry backoff.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Per-attempt deadline, if any.
    #[must_use]
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    /// Idle timeout for workers.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Task channel capacity for `workers` workers.
    #[must_use]
    pub fn capacity_for(&self, workers: usize) -> usize {
        workers.saturating_mul(self.capacity_multiplier).max(1)
    }

    /// Checks every field against its constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count < MIN_WORKER_COUNT {
            return Err(ConfigError::below_minimum(
                "worker_count",
                self.worker_count as u64,
                MIN_WORKER_COUNT as u64,
            ));
        }
        if self.max_retry < MIN_MAX_RETRY {
            return Err(ConfigError::below_minimum(
                "max_retry",
                u64::from(self.max_retry),
                u64::from(MIN_MAX_RETRY),
            ));
        }
        if self.capacity_multiplier < MIN_CAPACITY_MULTIPLIER {
            return Err(ConfigError::below_minimum(
                "capacity_multiplier",
                self.capacity_multiplier as u64,
                MIN_CAPACITY_MULTIPLIER as u64,
            ));
        }
        if self.item_timeout_ms == Some(0) {
            return Err(ConfigError::new("item_timeout_ms", "must be positive when set"));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::new("idle_timeout_ms", "must be positive"));
        }
        if self.retry_backoff.base_delay_ms > self.retry_backoff.max_delay_ms {
            return Err(ConfigError::new(
                "retry_backoff",
                "base_delay_ms exceeds max_delay_ms",
            ));
        }
        Ok(())
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.max_retry, 3);
        assert_eq!(config.item_timeout(), None);
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.capacity_multiplier, 100);
        assert_eq!(config.stall_policy, StallPolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = WorkflowConfig::new()
            .with_worker_count(8)
            .with_max_retry(2)
            .with_item_timeout(Duration::from_millis(1500))
            .with_idle_timeout(Duration::from_secs(1))
            .with_capacity_multiplier(4)
            .with_stall_policy(StallPolicy::Degrade);

        assert_eq!(config.worker_count, 8);
        assert_eq!(config.item_timeout_ms, Some(1500));
        assert_eq!(config.idle_timeout_ms, 1000);
        assert_eq!(config.capacity_for(8), 32);
        assert_eq!(config.stall_policy, StallPolicy::Degrade);
    }

    #[test]
    fn test_worker_count_below_minimum() {
        let err = WorkflowConfig::new().with_worker_count(1).validate().unwrap_err();
        assert_eq!(err.field, "worker_count");
    }

    #[test]
    fn test_max_retry_below_minimum() {
        let err = WorkflowConfig::new().with_max_retry(0).validate().unwrap_err();
        assert_eq!(err.field, "max_retry");
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let err = WorkflowConfig::new()
            .with_capacity_multiplier(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "capacity_multiplier");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let err = WorkflowConfig::new()
            .with_item_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "item_timeout_ms");

        let err = WorkflowConfig::new()
            .with_idle_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "idle_timeout_ms");
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
        assert_eq!(
            WorkflowConfig::new().with_idle_timeout(Duration::MAX).idle_timeout_ms,
            u64::MAX
        );
    }

    #[test]
    fn test_backoff_bounds_checked() {
        let backoff = RetryBackoff::exponential(500).with_max_delay_ms(100);
        let err = WorkflowConfig::new()
            .with_retry_backoff(backoff)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "retry_backoff");
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            WorkflowConfig::from_json(r#"{"worker_count": 3, "stall_policy": "degrade"}"#).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.max_retry, 3);
        assert_eq!(config.stall_policy, StallPolicy::Degrade);
        assert!(config.retry_backoff.is_immediate());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = WorkflowConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.field, "config");
    }
}
