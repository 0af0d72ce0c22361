//! Retry for transient SQLite lock errors
//!
//! WAL mode lets a deferred transaction read while another connection writes,
//! but the reader's later write fails with SQLITE_BUSY once its snapshot is
//! stale. The busy timeout does not cover that case, so the whole transaction
//! is retried from the start.

use crate::Result;
use std::future::Future;
use std::time::{Duration, Instant};

/// Default total time spent retrying one operation
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Run `operation` again with exponential backoff while it fails with a lock
/// error and `max_wait_ms` has not elapsed
///
/// Backoff starts at 10 ms and doubles up to 1000 ms. Any other error is
/// returned immediately.
pub async fn retry_on_lock<F, Fut, T>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_database_locked() => return Err(err),
            Err(err) => {
                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(err);
                }

                tracing::debug!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}
