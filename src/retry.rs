use std::time::Duration;

use crate::channels::provider::ProviderError;

/// Bounded exponential backoff shared by the channel senders.
///
/// `max_retries` counts re-attempts after the first try, so a policy with
/// `max_retries = 2` makes at most three provider calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry that follows `attempt` (1-based):
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let multiplier = 1u64.checked_shl(exp.min(10)).unwrap_or(u64::MAX);
        let base = self.base_delay.as_millis() as u64;
        let backoff = base.saturating_mul(multiplier);
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(std::cmp::min(backoff, max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { after: Duration },
    GiveUp,
}

/// Per-send attempt tracker: `Attempting -> Success | RetryScheduled | Failed`.
#[derive(Debug, Default)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of the attempt currently in flight, after `begin`.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Classify a failed attempt. Terminal errors give up immediately and
    /// consume no retry; retryable errors schedule a backoff until the
    /// policy's budget runs out.
    pub fn on_error(&self, err: &ProviderError, policy: &RetryPolicy) -> RetryDecision {
        if !err.is_retryable() {
            return RetryDecision::GiveUp;
        }
        if self.attempt > policy.max_retries {
            return RetryDecision::GiveUp;
        }
        let after = err.retry_after().unwrap_or_else(|| policy.backoff(self.attempt));
        RetryDecision::Retry { after }
    }
}

/// Drive `op` through the retry state machine until success, a terminal
/// error, or retry exhaustion. `op` receives the 1-based attempt number.
pub async fn retry_send<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut state = RetryState::new();
    loop {
        let attempt = state.begin();
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => match state.on_error(&err, policy) {
                RetryDecision::Retry { after } => {
                    tracing::debug!(
                        event = "send_retry_scheduled",
                        attempt,
                        backoff_ms = after.as_millis() as u64,
                        error = %err,
                        "retryable send failure, backing off"
                    );
                    tokio::time::sleep(after).await;
                }
                RetryDecision::GiveUp => return Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RetryDecision, RetryPolicy, RetryState, retry_send};
    use crate::channels::provider::ProviderError;
    use std::time::Duration;

    fn policy(max_retries: u32, base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = policy(5, 100, 10_000);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let policy = policy(10, 100, 500);
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(9), Duration::from_millis(500));
    }

    #[test]
    fn terminal_error_gives_up_without_retry() {
        let policy = policy(3, 10, 100);
        let mut state = RetryState::new();
        state.begin();
        let err = ProviderError::Permanent {
            message: "bad credentials".to_string(),
        };
        assert_eq!(state.on_error(&err, &policy), RetryDecision::GiveUp);
    }

    #[test]
    fn retryable_error_gives_up_after_budget() {
        let policy = policy(2, 10, 100);
        let mut state = RetryState::new();
        let err = ProviderError::Transient {
            message: "connection reset".to_string(),
        };
        state.begin();
        assert!(matches!(
            state.on_error(&err, &policy),
            RetryDecision::Retry { .. }
        ));
        state.begin();
        assert!(matches!(
            state.on_error(&err, &policy),
            RetryDecision::Retry { .. }
        ));
        state.begin();
        assert_eq!(state.on_error(&err, &policy), RetryDecision::GiveUp);
    }

    #[test]
    fn rate_limit_hint_overrides_backoff() {
        let policy = policy(3, 10, 100);
        let mut state = RetryState::new();
        state.begin();
        let err = ProviderError::RateLimit {
            retry_after: Some(Duration::from_millis(75)),
        };
        assert_eq!(
            state.on_error(&err, &policy),
            RetryDecision::Retry {
                after: Duration::from_millis(75)
            }
        );
    }

    #[tokio::test]
    async fn driver_counts_attempts_and_succeeds() {
        let policy = policy(3, 1, 5);
        let mut calls = 0u32;
        let result = retry_send(&policy, |_attempt| {
            calls += 1;
            let outcome = if calls < 3 {
                Err(ProviderError::Transient {
                    message: "blip".to_string(),
                })
            } else {
                Ok("receipt-1".to_string())
            };
            async move { outcome }
        })
        .await;
        assert_eq!(result.expect("send succeeds"), "receipt-1");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn driver_never_exceeds_retry_budget() {
        let policy = policy(2, 1, 5);
        let mut calls = 0u32;
        let result: Result<String, _> = retry_send(&policy, |_attempt| {
            calls += 1;
            async {
                Err(ProviderError::Transient {
                    message: "still down".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn driver_stops_on_terminal_error() {
        let policy = policy(5, 1, 5);
        let mut calls = 0u32;
        let result: Result<String, _> = retry_send(&policy, |_attempt| {
            calls += 1;
            async {
                Err(ProviderError::InvalidDestination {
                    message: "not a number".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
