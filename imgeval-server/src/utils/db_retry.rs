//! Retry of write transactions under SQLite lock contention
//!
//! Write paths open a deferred transaction, read their preconditions, then
//! write. When another connection commits in between, SQLite refuses the
//! upgrade with SQLITE_BUSY at once instead of waiting on the busy timeout.
//! The whole transaction is then re-run from the start, so the preconditions
//! are checked again against the newer snapshot.

use std::future::Future;
use std::time::{Duration, Instant};

use imgeval_common::{Error, Result};
use tracing::{debug, error, warn};

/// Give up after this long without a successful attempt
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 10_000;

const INITIAL_BACKOFF_MS: u64 = 5;
const MAX_BACKOFF_MS: u64 = 250;

/// Run `operation` until it succeeds, fails with a non-lock error, or
/// `max_wait_ms` elapses
///
/// Backoff starts at 5 ms and doubles up to 250 ms. Each attempt must open
/// its own transaction.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_lock_contention() => {
                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(Error::Internal(format!(
                        "{}: database locked after {} attempts ({} ms)",
                        operation_name,
                        attempt,
                        elapsed.as_millis()
                    )));
                }

                // Jitter keeps concurrent writers from retrying in lockstep
                let sleep_ms = backoff_ms + jitter_ms(backoff_ms);
                if attempt > 3 {
                    warn!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = sleep_ms,
                        "Database locked, will retry after backoff"
                    );
                } else {
                    debug!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = sleep_ms,
                        "Database locked, will retry after backoff"
                    );
                }

                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
            Err(err) => return Err(err),
        }
    }
}

fn jitter_ms(backoff_ms: u64) -> u64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..=backoff_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_first_attempt_success() {
        let result = retry_on_lock("test_op", 1000, || async { Ok::<i32, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_lock_error_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result = retry_on_lock("test_op", 1000, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, Error>(Error::AlreadyEvaluated) }
        })
        .await;

        assert!(matches!(result, Err(Error::AlreadyEvaluated)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
