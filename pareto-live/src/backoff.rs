//! Reconnect delay policy: capped exponential growth with full jitter.

use std::time::Duration;

use rand::Rng;

use pareto_core::ReconnectConfig;

/// Counts consecutive connection failures and hands out the delay before the
/// next attempt.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_attempts: Option<u32>,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            initial: config.initial_delay(),
            max: config.max_delay(),
            multiplier: config.multiplier,
            max_attempts: config.max_attempts,
            consecutive_failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Called once a connection has delivered something.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Upper bound of the delay after the `failures`-th consecutive failure.
    pub fn ceiling(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(64) as i32;
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Record a failure. `None` means the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.next_delay_with(&mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng>(&mut self, rng: &mut R) -> Option<Duration> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if let Some(max) = self.max_attempts {
            if self.consecutive_failures >= max {
                return None;
            }
        }
        let ceiling = self.ceiling(self.consecutive_failures).as_millis() as u64;
        Some(Duration::from_millis(rng.gen_range(0..=ceiling)))
    }
}
