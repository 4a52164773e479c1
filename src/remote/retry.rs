//! Retry/backoff policy. See `spec.md` §4.3.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    Exp,
    Fixed,
    Adaptive,
}

impl BackoffMode {
    /// Parses the `remote.rate_limit_mode` config string. Unrecognized
    /// values fall back to `Exp`, the same default `RetryPolicy` uses.
    #[must_use]
    pub fn parse_config_str(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "fixed" => Self::Fixed,
            "adaptive" => Self::Adaptive,
            _ => Self::Exp,
        }
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub mode: BackoffMode,
    pub base_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            mode: BackoffMode::Exp,
            base_delay: Duration::from_millis(1000),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `n` (0-indexed, so `n=0` is the delay before
    /// the first retry after the initial attempt).
    #[must_use]
    pub fn delay_for(&self, n: u32) -> Duration {
        match self.mode {
            BackoffMode::Fixed => self.base_delay,
            BackoffMode::Exp => self.base_delay.saturating_mul(1 << n.min(20)),
            BackoffMode::Adaptive => {
                let exp = self.base_delay.saturating_mul(1 << n.min(20));
                let jitter_ratio: f64 = rand::thread_rng().gen_range(0.0..=0.5);
                exp.saturating_add(Duration::from_secs_f64(exp.as_secs_f64() * jitter_ratio))
            }
        }
    }

    /// Parses a `Retry-After` header value (delay-seconds or HTTP-date)
    /// and, if present and parseable, overrides the computed backoff.
    #[must_use]
    pub fn resolve_delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if let Some(value) = retry_after {
            if let Ok(secs) = value.trim().parse::<u64>() {
                return Duration::from_secs(secs);
            }
            if let Ok(when) = httpdate::parse_http_date(value) {
                if let Ok(remaining) = when.duration_since(std::time::SystemTime::now()) {
                    return remaining;
                }
                return Duration::from_secs(0);
            }
        }
        self.delay_for(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_each_attempt() {
        let policy = RetryPolicy {
            mode: BackoffMode::Exp,
            base_delay: Duration::from_millis(100),
            max_retries: 5,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn fixed_never_changes() {
        let policy = RetryPolicy {
            mode: BackoffMode::Fixed,
            base_delay: Duration::from_millis(250),
            max_retries: 5,
        };
        assert_eq!(policy.delay_for(0), policy.delay_for(3));
    }

    #[test]
    fn adaptive_is_at_least_exponential() {
        let policy = RetryPolicy {
            mode: BackoffMode::Adaptive,
            base_delay: Duration::from_millis(100),
            max_retries: 5,
        };
        let exp = Duration::from_millis(200);
        assert!(policy.delay_for(1) >= exp);
        assert!(policy.delay_for(1) <= exp + exp / 2);
    }

    #[test]
    fn retry_after_seconds_overrides_backoff() {
        let policy = RetryPolicy::default();
        let delay = policy.resolve_delay(0, Some("5"));
        assert_eq!(delay, Duration::from_secs(5));
    }

    #[test]
    fn missing_retry_after_falls_back_to_computed() {
        let policy = RetryPolicy::default();
        let delay = policy.resolve_delay(2, None);
        assert_eq!(delay, policy.delay_for(2));
    }
}
