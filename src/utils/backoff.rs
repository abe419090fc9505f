use std::time::Duration;

// ============================================================================
// Exponential Backoff
// ============================================================================
//
// Delay schedule for the publisher after a failed cycle. The delay grows by
// `multiplier` per consecutive failure, is capped at `max_delay`, and starts
// over once a cycle succeeds.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor between consecutive failures
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.initial_delay.min(config.max_delay);
        Self {
            config,
            attempts: 0,
            current,
        }
    }

    /// Delay to wait before the next attempt. Each call counts as one failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempts += 1;
        self.current = Duration::from_millis(
            ((self.current.as_millis() as f64) * self.config.multiplier) as u64,
        )
        .min(self.config.max_delay);
        delay
    }

    pub fn reset(&mut self) {
        if self.attempts > 0 {
            tracing::debug!(failures = self.attempts, "Backoff reset");
        }
        self.attempts = 0;
        self.current = self.config.initial_delay.min(self.config.max_delay);
    }

    /// Consecutive failures since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
