//! Retry with exponential-full-jitter backoff (spec §4.6).
//!
//! Retryable categories default to the error taxonomy's own
//! `ErrorKind::is_default_retryable` (transport failure, timeout, TRYAGAIN);
//! a caller may opt additional kinds in (e.g. `ReadOnly`, for a Sentinel
//! client that wants the router's own rediscovery loop to also count
//! against the outer retry budget).

use crate::error::{Error, ErrorKind};
use rand::Rng;
use std::{collections::HashSet, future::Future, time::Duration};

/// Tuning for [`RetryPolicy::retry`]. Defaults match spec §4.6: base 25 ms,
/// cap 2 s, full jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_retries:       u32,
  pub base_delay:        Duration,
  pub max_delay:         Duration,
  /// Error kinds the caller opts in to retrying beyond the default set.
  pub extra_retryable:   HashSet<ErrorKind>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    RetryPolicy {
      max_retries:     3,
      base_delay:      Duration::from_millis(25),
      max_delay:       Duration::from_secs(2),
      extra_retryable: HashSet::new(),
    }
  }
}

impl RetryPolicy {
  pub fn new(max_retries: u32) -> Self {
    RetryPolicy {
      max_retries,
      ..Default::default()
    }
  }

  pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
    self.base_delay = base_delay;
    self.max_delay = max_delay;
    self
  }

  /// Opt an additional error kind into this policy's retryable set, e.g.
  /// `ErrorKind::ReadOnly` for a Sentinel client (spec §4.5.2: "a server
  /// error ... indicates the endpoint was demoted ... retry").
  pub fn retry_on(mut self, kind: ErrorKind) -> Self {
    self.extra_retryable.insert(kind);
    self
  }

  pub fn is_retryable(&self, error: &Error) -> bool {
    error.is_retryable() || self.extra_retryable.contains(error.kind())
  }

  /// Full-jitter exponential backoff: `uniform(0, min(cap, base * 2^attempt))`.
  /// `attempt` is 0-indexed (the delay before the first retry).
  pub fn backoff(&self, attempt: u32) -> Duration {
    let scaled = self.base_delay.as_millis().saturating_mul(1u128 << attempt.min(32));
    let cap = scaled.min(self.max_delay.as_millis());
    if cap == 0 {
      return Duration::from_millis(0);
    }
    let jittered = rand::thread_rng().gen_range(0 ..= cap);
    Duration::from_millis(jittered as u64)
  }

  /// Run `op` until it succeeds, a non-retryable error is returned, or
  /// `max_retries` is exhausted. `on_retry` is invoked with the error that
  /// triggered a retry before the backoff sleep — the hook point the spec
  /// uses to poison the connection that just failed (spec §4.6 "optional
  /// per-retry hook").
  pub async fn retry<F, Fut, T>(&self, mut op: F, mut on_retry: impl FnMut(&Error)) -> Result<T, Error>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
  {
    let mut attempt = 0u32;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(err) if attempt < self.max_retries && self.is_retryable(&err) => {
          on_retry(&err);
          tokio::time::sleep(self.backoff(attempt)).await;
          attempt += 1;
        },
        Err(err) => return Err(err),
      }
    }
  }
}
