use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::GatewayError;

/// Per-attempt timeout plus a bounded number of attempts with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Idempotent reads get one retry.
    pub fn idempotent(timeout: Duration, backoff: Duration) -> Self {
        Self {
            attempts: 2,
            timeout,
            backoff,
        }
    }

    /// Non-idempotent calls such as certificate generation are never repeated.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            attempts: 1,
            timeout,
            backoff: Duration::ZERO,
        }
    }

    /// Longest a call under this policy can take: every attempt timing out plus the backoff between them.
    pub fn budget(&self) -> Duration {
        let attempts = self.attempts.max(1);
        let backoff_steps = attempts * (attempts - 1) / 2;
        self.timeout
            .saturating_mul(attempts)
            .saturating_add(self.backoff.saturating_mul(backoff_steps))
    }

    pub async fn run<T, F, Fut>(&self, endpoint: &'static str, mut call: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(GatewayError::Timeout {
                    endpoint,
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && err.is_retryable() => {
                    warn!(endpoint, attempt, error = %err, "collaborator call failed; retrying");
                    tokio::time::sleep(self.backoff.saturating_mul(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const ENDPOINT: &str = "/api/trust/calculate-qualification";

    fn quick_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn budget_covers_every_attempt_and_backoff() {
        assert_eq!(quick_policy(1).budget(), Duration::from_millis(50));
        assert_eq!(quick_policy(3).budget(), Duration::from_millis(153));
        assert_eq!(
            RetryPolicy::single_attempt(Duration::from_secs(8)).budget(),
            Duration::from_secs(8)
        );
    }

    #[tokio::test]
    async fn retries_transient_failures_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = quick_policy(2)
            .run(ENDPOINT, || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(GatewayError::Status {
                            endpoint: ENDPOINT,
                            status: 503,
                        })
                    } else {
                        Ok("verdict")
                    }
                }
            })
            .await;

        assert_eq!(result.expect("second attempt succeeds"), "verdict");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_calls_time_out_on_every_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = quick_policy(2)
            .run(ENDPOINT, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                }
            })
            .await;

        assert!(result.expect_err("calls time out").is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_attempt_policy_never_repeats() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = RetryPolicy::single_attempt(Duration::from_millis(50))
            .run("/api/trust/complete-certificate", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Status {
                        endpoint: "/api/trust/complete-certificate",
                        status: 502,
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = quick_policy(3)
            .run(ENDPOINT, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Rejected {
                        endpoint: ENDPOINT,
                        reason: "unsupported hs code".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
