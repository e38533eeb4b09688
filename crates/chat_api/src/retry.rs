use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

fn transient_error_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused")
            .expect("retry regex must compile")
    })
}

/// Bounded exponential backoff for chat requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Whether a failed response with `status` and `body` is worth another try.
    ///
    /// Quota exhaustion arrives as 429 from most providers but never clears.
    pub fn should_retry_status(&self, status: u16, body: &str) -> bool {
        if is_quota_exhausted(body) {
            return false;
        }
        matches!(status, 429 | 500 | 502 | 503 | 504) || transient_error_regex().is_match(body)
    }

    /// Delay before retry number `attempt` (zero based): `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor)
    }
}

pub fn is_quota_exhausted(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    lowered.contains("insufficient_quota") || lowered.contains("exceeded your current quota")
}
