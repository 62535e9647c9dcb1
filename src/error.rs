//! Error taxonomy of the dispatch core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    /// No capacity or time window fits. Endpoints report this as a null or
    /// empty result, not a failure.
    #[error("no feasible insertion")]
    Infeasible,

    /// The routing oracle returned no duration for a required leg. The
    /// affected candidate is dropped, never treated as zero driving time.
    #[error("routing oracle returned no duration for a required leg")]
    RoutingUnavailable,

    /// Serialization failure, deadlock, or a stale snapshot detected at
    /// commit. Retried by the transaction combinator; surfaced only once
    /// the attempt budget is exhausted.
    #[error("concurrent booking conflict")]
    ConcurrencyConflict,

    /// An impossible schedule update was computed. Indicates an upstream
    /// logic defect and is raised immediately, never clamped.
    #[error("schedule invariant violated: {0}")]
    InvariantViolation(String),

    #[error("not authorized")]
    AuthorizationDenied,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("routing oracle request failed: {0}")]
    Oracle(#[source] anyhow::Error),
}

impl BookingError {
    /// Whether the whole unit of work should be re-run.
    pub fn is_retryable(&self) -> bool {
        match self {
            BookingError::ConcurrencyConflict => true,
            BookingError::Database(sqlx::Error::Database(e)) => {
                matches!(e.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        assert!(BookingError::ConcurrencyConflict.is_retryable());
    }

    #[test]
    fn test_infeasible_is_not_retryable() {
        assert!(!BookingError::Infeasible.is_retryable());
        assert!(!BookingError::AuthorizationDenied.is_retryable());
        assert!(!BookingError::InvariantViolation("x".into()).is_retryable());
    }
}
