use crate::error::TryoutLinkError;
use std::time::Duration;

/// Exponential backoff for transient query failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether a failure after `attempt` retries may be retried again.
    pub fn should_retry(&self, attempt: u32, err: &TryoutLinkError) -> bool {
        attempt < self.max_retries && err.is_retriable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_only_transient_errors_retry() {
        let policy = policy();
        let server_down = TryoutLinkError::Api(ApiError::new(503, "unavailable"));
        assert!(policy.should_retry(0, &server_down));
        assert!(policy.should_retry(2, &server_down));
        assert!(!policy.should_retry(3, &server_down));
        assert!(policy.should_retry(0, &TryoutLinkError::NetworkError("reset".into())));

        for status in [400, 401, 403, 404, 409, 422, 429] {
            let err = TryoutLinkError::Api(ApiError::new(status, "nope"));
            assert!(!policy.should_retry(0, &err), "status {} must not retry", status);
        }
        assert!(!policy.should_retry(0, &TryoutLinkError::SessionExpired));
    }

    #[test]
    fn test_zero_retries_never_retry() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(30));
        assert!(!policy.should_retry(0, &TryoutLinkError::TimeoutError("slow".into())));
    }
}
