use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Exponential,
}

/// Local retry schedule for retryable execution failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Upper bound of the random pause added to every delay
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            backoff: Backoff::Exponential,
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Zero delays, for tests
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            jitter: Duration::ZERO,
        }
    }

    /// Pause before retry number `retry` (1-based), without jitter
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let factor = 1u32 << retry.saturating_sub(1).min(16);
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// Pause before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay_for(retry);
        if self.jitter.is_zero() {
            return base;
        }
        let jitter_ms = self.jitter.as_millis() as u64;
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
