//! Reconnect retry policy.
//!
//! Replaces ad-hoc timer scheduling with a policy object the connection
//! supervisor consults, so retry behavior is testable without wall-clock
//! waits.

use std::time::Duration;

/// Fixed-delay retry policy with an optional attempt cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` = retry forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Delay before the given 1-based attempt, or `None` when the policy
    /// is exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt > max => None,
            _ => Some(self.delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_policy_never_exhausts() {
        let policy = RetryPolicy::new(Duration::from_secs(10), None);
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_capped_policy_exhausts_after_max() {
        let policy = RetryPolicy::new(Duration::from_secs(5), Some(3));
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(4), None);
    }
}
