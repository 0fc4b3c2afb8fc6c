//! Reconnect backoff with jitter

use rand::Rng;
use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failure, and after every successful connection
    pub floor: Duration,
    /// Upper bound on the base delay
    pub ceiling: Duration,
    /// Jitter as a fraction of the base delay (0.2 = ±20%)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(5),
            ceiling: Duration::from_secs(60),
            jitter_factor: 0.2,
        }
    }
}

/// Doubling backoff between `floor` and `ceiling`.
///
/// The base delay never decreases across consecutive failures; only
/// [`Backoff::reset`] brings it back to the floor. Jitter is applied to the
/// returned delay, not to the base.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.floor.min(config.ceiling);
        Self { config, current }
    }

    /// Base delay the next call to [`Backoff::next_delay`] will use
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Delay to wait now; doubles the base for the following call
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = base.saturating_mul(2).min(self.config.ceiling);
        self.apply_jitter(base)
    }

    /// Back to the floor after a successful connection
    pub fn reset(&mut self) {
        self.current = self.config.floor.min(self.config.ceiling);
    }

    /// Largest delay [`Backoff::next_delay`] can return for a given base
    pub fn max_jittered(&self, base: Duration) -> Duration {
        base.mul_f64(1.0 + self.config.jitter_factor.max(0.0))
    }

    fn apply_jitter(&self, base: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }

        let base_ms = base.as_millis() as f64;
        let range = base_ms * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-range..=range);
        Duration::from_millis((base_ms + jitter).max(1.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(floor_ms: u64, ceiling_ms: u64) -> Backoff {
        Backoff::new(BackoffConfig {
            floor: Duration::from_millis(floor_ms),
            ceiling: Duration::from_millis(ceiling_ms),
            jitter_factor: 0.0,
        })
    }

    #[test]
    fn test_default_config() {
        let config = BackoffConfig::default();
        assert_eq!(config.floor, Duration::from_secs(5));
        assert_eq!(config.ceiling, Duration::from_secs(60));
    }

    #[test]
    fn test_doubles_up_to_ceiling() {
        let mut backoff = no_jitter(5_000, 60_000);
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn test_monotonic_after_consecutive_failures() {
        let mut backoff = no_jitter(100, 10_000);
        let mut previous = Duration::ZERO;
        for _ in 0..20 {
            let base = backoff.current();
            assert!(base >= previous);
            previous = base;
            backoff.next_delay();
        }
        assert_eq!(backoff.current(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_reset_returns_to_floor() {
        let mut backoff = no_jitter(5_000, 60_000);
        for _ in 0..4 {
            backoff.next_delay();
        }
        assert!(backoff.current() > Duration::from_secs(5));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut backoff = Backoff::new(BackoffConfig {
            floor: Duration::from_secs(5),
            ceiling: Duration::from_secs(60),
            jitter_factor: 0.2,
        });
        for _ in 0..200 {
            backoff.reset();
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(6));
        }
        assert_eq!(
            backoff.max_jittered(Duration::from_secs(5)),
            Duration::from_secs(6)
        );
    }

    #[test]
    fn test_floor_above_ceiling_is_clamped() {
        let mut backoff = no_jitter(10_000, 1_000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1_000));
    }
}
