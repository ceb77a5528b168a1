use std::time::Duration;

/// Bounds for the engine's internal retries.
///
/// Used for optimistic-lock restarts, transient read failures and
/// compensation writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, the first one included (default: 5).
    pub max_attempts: u32,
    /// Delay before the first retry (default: 10ms).
    pub base_backoff_ms: u64,
    /// Upper bound for a single delay (default: 1000ms).
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 10,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff_ms,
            max_backoff_ms,
        }
    }

    /// No delay between tries. Handy in tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 0, 0)
    }

    /// Delay to wait after the `retry_count`-th failed try (0-based).
    pub fn backoff_duration(&self, retry_count: u32) -> Duration {
        let delay = self
            .base_backoff_ms
            .saturating_mul(2u64.saturating_pow(retry_count));
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    /// `true` while another try is allowed after `attempt` tries.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
