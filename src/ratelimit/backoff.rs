//! Jittered retry delay for exhausted windows.

use rand::Rng;
use std::time::Duration;

use crate::config::BackoffConfig;

/// Computes how long a waiting caller sleeps before polling again.
///
/// Callers exhausted in the same window would otherwise all wake at the same
/// boundary; the random offset spreads their retries.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    min_micros: u64,
    max_micros: u64,
}

impl Backoff {
    /// Jitter drawn from `[min_micros, max_micros)` microseconds.
    pub fn new(min_micros: u64, max_micros: u64) -> Self {
        Self {
            min_micros,
            max_micros,
        }
    }

    /// A uniformly random duration in `[min, max)`, or `min` for an empty range.
    pub fn jitter(&self) -> Duration {
        if self.max_micros <= self.min_micros {
            return Duration::from_micros(self.min_micros);
        }

        Duration::from_micros(rand::thread_rng().gen_range(self.min_micros..self.max_micros))
    }

    /// Sleep until the window rolls over, offset by jitter.
    pub fn delay(&self, until_reset: Duration) -> Duration {
        until_reset.saturating_add(self.jitter())
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(config.min_micros, config.max_micros)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_within_range() {
        let backoff = Backoff::new(10, 60);

        for _ in 0..1000 {
            let jitter = backoff.jitter();
            assert!(jitter >= Duration::from_micros(10));
            assert!(jitter < Duration::from_micros(60));
        }
    }

    #[test]
    fn test_jitter_varies() {
        let backoff = Backoff::new(0, 10_000);
        let first = backoff.jitter();
        assert!((0..100).any(|_| backoff.jitter() != first));
    }

    #[test]
    fn test_empty_range_returns_min() {
        let backoff = Backoff::new(40, 40);
        assert_eq!(backoff.jitter(), Duration::from_micros(40));
    }

    #[test]
    fn test_delay_adds_jitter_to_reset() {
        let backoff = Backoff::new(10, 20);
        let delay = backoff.delay(Duration::from_millis(300));
        assert!(delay >= Duration::from_micros(300_010));
        assert!(delay < Duration::from_micros(300_020));
    }

    #[test]
    fn test_large_range_is_not_truncated() {
        let backoff = Backoff::new(u64::MAX - 1, u64::MAX);
        assert_eq!(backoff.jitter(), Duration::from_micros(u64::MAX - 1));
    }

    #[test]
    fn test_from_config() {
        let backoff = Backoff::from(&BackoffConfig {
            min_micros: 5,
            max_micros: 5,
        });
        assert_eq!(backoff.jitter(), Duration::from_micros(5));
    }
}
