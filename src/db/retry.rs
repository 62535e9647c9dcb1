//! Retry combinator for units of work racing on shared rows.
//!
//! Concurrent bookings conflict under serializable isolation; the losing
//! transaction aborts with a serialization failure or deadlock and is
//! simply run again from scratch, including its preparation reads.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::constants::{MAX_TRANSACTION_RETRIES, TRANSACTION_RETRY_BASE_DELAY_MS};
use crate::error::BookingError;

/// Backoff schedule: `base_delay_ms * factor^attempt` between attempts.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay_ms: TRANSACTION_RETRY_BASE_DELAY_MS,
            factor: 1.5,
            max_attempts: MAX_TRANSACTION_RETRIES,
        }
    }
}

impl Backoff {
    fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis((self.base_delay_ms as f64 * self.factor.powi(attempt as i32)) as u64)
    }
}

/// Run `body` until it succeeds, the predicate rejects the error, or the
/// attempt budget is spent.
pub async fn retry_with<T, E, F, Fut, P>(
    backoff: Backoff,
    is_retryable: P,
    mut body: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match body().await {
            Err(e) if is_retryable(&e) && attempt + 1 < backoff.max_attempts => {
                let delay = backoff.delay(attempt);
                warn!(
                    "retryable failure ({e}), attempt {} of {}, backing off {:?}",
                    attempt + 1,
                    backoff.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// The standard schedule with the booking-error predicate.
pub async fn retry_serializable<T, F, Fut>(body: F) -> Result<T, BookingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BookingError>>,
{
    retry_with(Backoff::default(), BookingError::is_retryable, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_backoff() -> Backoff {
        Backoff {
            base_delay_ms: 1,
            factor: 1.5,
            max_attempts: 5,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let calls = AtomicU32::new(0);
        let result = retry_with(fast_backoff(), BookingError::is_retryable, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(BookingError::ConcurrencyConflict)
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted_surfaces_conflict() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(fast_backoff(), BookingError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BookingError::ConcurrencyConflict) }
        })
        .await;
        assert!(matches!(result, Err(BookingError::ConcurrencyConflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_losing_booking_retries_then_sees_infeasible() {
        // A racing booking loses the slot: the first attempt aborts with a
        // conflict, the re-run observes the winner's committed state and
        // reports infeasibility.
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(fast_backoff(), BookingError::is_retryable, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(BookingError::ConcurrencyConflict)
                } else {
                    Err(BookingError::Infeasible)
                }
            }
        })
        .await;
        assert!(matches!(result, Err(BookingError::Infeasible)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with(fast_backoff(), BookingError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BookingError::Infeasible) }
        })
        .await;
        assert!(matches!(result, Err(BookingError::Infeasible)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
