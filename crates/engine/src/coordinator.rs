//! The transaction coordinator: a bounded-retry atomic executor.
//!
//! Every mutation in the engine (review upsert/delete, like toggle,
//! favorite toggle) is exactly one call into [`run_atomically`]. The unit
//! of work reads whatever it needs through the transaction, computes, and
//! stages its writes; the coordinator commits and, when a conflicting
//! concurrent commit won the race, transparently re-runs the whole unit
//! against fresh state with exponential backoff. No call site carries its
//! own retry loop, and no component manages locking itself.

use std::sync::atomic::{AtomicU32, Ordering};

use backon::{ExponentialBuilder, Retryable};
use snafu::ResultExt;

use marquee_store::{Database, Transaction};

use crate::config::RetryPolicy;
use crate::error::{EngineError, Result, StoreSnafu};

/// Executes `unit` as one atomic read-then-write transaction, retrying on
/// conflict per `policy`.
///
/// The unit must be re-runnable from scratch: it is invoked once per
/// attempt with a fresh transaction and must derive everything it writes
/// from what it reads in that same attempt.
///
/// # Errors
///
/// - Non-retryable failures from the unit (validation, codec) surface
///   immediately, unchanged.
/// - Conflicts are retried up to `policy.max_attempts` total attempts; on
///   exhaustion the caller gets [`EngineError::RetryExhausted`].
pub async fn run_atomically<T, F>(db: &Database, policy: &RetryPolicy, unit: F) -> Result<T>
where
    F: Fn(&mut Transaction<'_>) -> Result<T>,
{
    // backon's max_times counts retries, not total attempts.
    let max_retries = policy.max_attempts.saturating_sub(1) as usize;

    let mut backoff = ExponentialBuilder::new()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(max_retries);
    if policy.jitter {
        backoff = backoff.with_jitter();
    }

    let retries = AtomicU32::new(0);

    let attempt = || async {
        let mut txn = db.begin();
        let out = unit(&mut txn)?;
        txn.commit().context(StoreSnafu)?;
        Ok(out)
    };

    attempt
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(|e: &EngineError| e.is_retryable())
        .notify(|err: &EngineError, dur| {
            let attempt = retries.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                attempt,
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "transaction conflicted; retrying after backoff"
            );
        })
        .await
        .map_err(|e| {
            if e.is_retryable() {
                EngineError::RetryExhausted {
                    attempts: retries.load(Ordering::SeqCst) + 1,
                    last_error: e.to_string(),
                }
            } else {
                e
            }
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use marquee_store::tables::Stats;

    use super::*;
    use crate::error::ValidationSnafu;

    fn conflict_policy() -> RetryPolicy {
        // Keep test backoffs tiny.
        RetryPolicy::default()
            .with_max_attempts(3)
            .with_initial_backoff(std::time::Duration::from_millis(1))
            .with_jitter(false)
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let db = Database::open_in_memory();
        let result = run_atomically(&db, &RetryPolicy::default(), |txn| {
            txn.insert::<Stats>(b"s", vec![1]);
            Ok(42u32)
        })
        .await
        .expect("should commit");
        assert_eq!(result, 42);
        assert_eq!(db.read().get::<Stats>(b"s"), Some(vec![1]));
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_immediate() {
        let db = Database::open_in_memory();
        let calls = AtomicU32::new(0);
        let result: Result<()> = run_atomically(&db, &conflict_policy(), |_txn| {
            calls.fetch_add(1, Ordering::SeqCst);
            marquee_types::validate_score("seat", 9.0).context(ValidationSnafu)?;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(EngineError::Validation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry for validation failures");
    }

    #[tokio::test]
    async fn test_conflict_is_retried_transparently() {
        let db = Database::open_in_memory();
        let calls = AtomicU32::new(0);

        let result = run_atomically(&db, &conflict_policy(), |txn| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            let _current = txn.get::<Stats>(b"s");
            if attempt == 0 {
                // A rival commit lands between this unit's read and commit.
                let mut rival = db.begin();
                rival.insert::<Stats>(b"s", vec![0xAA]);
                rival.commit().expect("rival should commit");
            }
            txn.insert::<Stats>(b"s", vec![0xBB]);
            Ok(attempt)
        })
        .await
        .expect("should succeed on retry");

        assert_eq!(result, 1, "unit should have been re-run once");
        assert_eq!(db.read().get::<Stats>(b"s"), Some(vec![0xBB]));
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_single_failure() {
        let db = Database::open_in_memory();
        let policy = conflict_policy().with_max_attempts(2);

        let result: Result<()> = run_atomically(&db, &policy, |txn| {
            let _current = txn.get::<Stats>(b"s");
            // Sabotage every attempt.
            let mut rival = db.begin();
            rival.insert::<Stats>(b"s", vec![0]);
            rival.commit().expect("rival should commit");
            txn.insert::<Stats>(b"s", vec![1]);
            Ok(())
        })
        .await;

        match result {
            Err(EngineError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }
}
