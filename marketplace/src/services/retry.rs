// marketplace/src/services/retry.rs

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry schedule for storage calls that are safe to repeat. Attempt `n`
/// (1-based) waits `backoff * n` before the next try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      backoff: Duration::from_millis(50),
    }
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, backoff: Duration) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      backoff,
    }
  }

  /// Runs `op` until it succeeds or attempts run out; returns the last error.
  pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
  {
    let mut attempt = 1;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(err) if attempt < self.max_attempts => {
          warn!(operation = what, attempt, error = %err, "Attempt failed, retrying.");
          tokio::time::sleep(self.backoff * attempt).await;
          attempt += 1;
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

  #[tokio::test]
  async fn retries_until_success() {
    let calls = &AtomicU32::new(0);
    let policy = RetryPolicy::new(3, Duration::from_millis(1));
    let result: Result<u32, String> = policy
      .run("flaky", || async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 3 {
          Err(format!("failure {}", n))
        } else {
          Ok(n)
        }
      })
      .await;
    assert_eq!(result, Ok(3));
  }

  #[tokio::test]
  async fn gives_up_after_max_attempts() {
    let calls = &AtomicU32::new(0);
    let policy = RetryPolicy::new(2, Duration::from_millis(1));
    let result: Result<(), &str> = policy
      .run("always_fails", || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err("down")
      })
      .await;
    assert_eq!(result, Err("down"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
