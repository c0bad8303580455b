// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Retry an idempotent async operation with doubling backoff, capped.
///
/// Only read-style calls go through here (price reads, quotes). Swap
/// execution is never retried.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut op: F,
    attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = base_delay;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                tracing::debug!(target: "backoff", attempt, error = %err, "Retrying after failure");
                sleep(delay).await;
                delay = delay.saturating_mul(2).min(MAX_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("attempts is at least 1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(11)
                    }
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap(), 11);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let result: Result<(), String> = retry_with_backoff(
            || async { Err("down".to_string()) },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap_err(), "down");
    }

    #[tokio::test]
    async fn single_attempt_does_not_sleep() {
        let result: Result<u32, String> =
            retry_with_backoff(|| async { Ok(3) }, 1, Duration::from_secs(30)).await;
        assert_eq!(result.unwrap(), 3);
    }
}
