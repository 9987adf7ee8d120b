//! Bounded retry for optimistic-concurrency conflicts.
//!
//! The compare-and-swap primitives never retry on their own. Callers that want
//! at-least-eventually-succeeds semantics wrap a whole operation in a
//! [`RetryPolicy`]; only `Conflict` failures are retried, never funds or
//! validation failures.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use alphabank_core::DomainResult;

/// Jittered exponential backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_pct: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64, jitter_pct: f64) -> Self {
        let clamped_attempts = max_attempts.max(1);
        let clamped_base = base_delay_ms.max(1);
        let clamped_max_delay = max_delay_ms.max(clamped_base);
        let clamped_jitter = jitter_pct.clamp(0.0, 1.0);
        Self {
            max_attempts: clamped_attempts,
            base_delay_ms: clamped_base,
            max_delay_ms: clamped_max_delay,
            jitter_pct: clamped_jitter,
        }
    }

    /// A single attempt: conflicts surface immediately.
    pub fn fail_fast() -> Self {
        Self::new(1, 1, 1, 0.0)
    }

    /// Used for compensating adjustments, which must land even under
    /// contention on the account being restored.
    pub fn compensation() -> Self {
        Self::new(8, 5, 200, 0.2)
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let exp = 2_u64.saturating_pow(attempt as u32);
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        let jittered = if self.jitter_pct > 0.0 {
            let spread = (delay as f64 * self.jitter_pct) as i64;
            let delta = rand::thread_rng().gen_range(-spread..=spread);
            delay.saturating_add_signed(delta)
        } else {
            delay
        };
        Duration::from_millis(jittered)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the zero-based attempt number.
    pub async fn retry_async_if<F, Fut, T, E, P>(&self, should_retry: P, mut op: F) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(val) => return Ok(val),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !should_retry(&err) {
                        return Err(err);
                    }
                    let delay = self.next_delay(attempt - 1);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after conflict");
                    sleep(delay).await;
                }
            }
        }
    }

    /// Retry only optimistic-concurrency conflicts.
    pub async fn retry_on_conflict<F, Fut, T>(&self, op: F) -> DomainResult<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: std::future::Future<Output = DomainResult<T>>,
    {
        self.retry_async_if(|e: &alphabank_core::DomainError| e.is_conflict(), op)
            .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fail_fast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphabank_core::DomainError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn new_clamps_input_parameters() {
        let policy = RetryPolicy::new(0, 0, 0, 2.0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay_ms, 1);
        assert_eq!(policy.max_delay_ms, 1);
        assert_eq!(policy.jitter_pct, 1.0);
    }

    #[test]
    fn next_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 100, 500, 0.0);
        let delays: Vec<_> = (0..5).map(|attempt| policy.next_delay(attempt)).collect();
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(500)); // capped
        assert_eq!(delays[4], Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn conflicts_are_retried_until_success() {
        let policy = RetryPolicy::new(3, 10, 10, 0.0);
        let attempts = Arc::new(AtomicUsize::new(0));

        let result = policy
            .retry_on_conflict(|attempt| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(DomainError::conflict("stale"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn funds_failures_are_never_retried() {
        let policy = RetryPolicy::new(5, 1, 1, 0.0);
        let attempts = Arc::new(AtomicUsize::new(0));

        let result: DomainResult<()> = policy
            .retry_on_conflict(|_| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::InsufficientFunds {
                        available: alphabank_core::Decimal::ZERO,
                        requested: alphabank_core::Decimal::ONE,
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(DomainError::InsufficientFunds { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_surfaces_the_first_conflict() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: DomainResult<()> = RetryPolicy::fail_fast()
            .retry_on_conflict(|_| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::conflict("stale"))
                }
            })
            .await;

        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
