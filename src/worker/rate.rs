//! Per-worker allocation pacing

use crate::error::ChurnError;
use std::time::Duration;

/// Converts a target allocation rate into a fixed per-step delay
///
/// The delay is always `1 / rate` seconds. Time spent allocating is not
/// subtracted, so a worker's achieved rate can fall below the target but never
/// exceed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    rate: f64,
    interval: Duration,
}

impl RateLimiter {
    /// Create a limiter for `rate` allocations per second
    ///
    /// # Errors
    ///
    /// `rate` must be finite and positive.
    pub fn new(rate: f64) -> Result<Self, ChurnError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ChurnError::Config(format!(
                "allocation rate must be positive, got {}",
                rate
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / rate).map_err(|_| {
            ChurnError::Config(format!("allocation rate {} is too small to pace", rate))
        })?;
        Ok(Self { rate, interval })
    }

    /// Delay to wait after the current step
    #[inline]
    pub fn next_delay(&self) -> Duration {
        self.interval
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_rate() {
        let limiter = RateLimiter::new(8.0).unwrap();
        assert_eq!(limiter.next_delay(), Duration::from_millis(125));
        assert_eq!(limiter.rate(), 8.0);
    }

    #[test]
    fn test_delay_is_constant() {
        let limiter = RateLimiter::new(3.0).unwrap();
        let first = limiter.next_delay();
        for _ in 0..10 {
            assert_eq!(limiter.next_delay(), first);
        }
    }

    #[test]
    fn test_fractional_rate() {
        let limiter = RateLimiter::new(0.5).unwrap();
        assert_eq!(limiter.next_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_rates() {
        assert!(RateLimiter::new(0.0).is_err());
        assert!(RateLimiter::new(-1.0).is_err());
        assert!(RateLimiter::new(f64::NAN).is_err());
        assert!(RateLimiter::new(f64::INFINITY).is_err());
        assert!(RateLimiter::new(f64::MIN_POSITIVE).is_err());
    }
}
