//! Sliding-window failure-rate detector (spec §3, §4.5.6): backs the
//! active-active multiplexer's decision to fail a region over. Two
//! append-only sorted sequences of monotonic timestamps; old entries are
//! pruned via binary search on every read rather than by a background
//! sweep.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FailureDetectorConfig {
  pub window:                 Duration,
  pub min_failures:           u32,
  pub failure_rate_threshold: f64,
}

impl Default for FailureDetectorConfig {
  fn default() -> Self {
    FailureDetectorConfig {
      window:                 Duration::from_secs(60),
      min_failures:           5,
      failure_rate_threshold: 0.5,
    }
  }
}

pub struct FailureDetector {
  config:    FailureDetectorConfig,
  failures:  Mutex<Vec<Instant>>,
  successes: Mutex<Vec<Instant>>,
}

/// Drop every entry older than `window`, relying on the vector staying
/// sorted by insertion order (timestamps are monotonically non-decreasing
/// since `Instant::now()` is monotonic) so a `partition_point` binary
/// search finds the cut point in O(log n) rather than a linear scan.
fn prune(entries: &mut Vec<Instant>, window: Duration) {
  let cutoff = Instant::now().checked_sub(window);
  if let Some(cutoff) = cutoff {
    let idx = entries.partition_point(|t| *t < cutoff);
    entries.drain(.. idx);
  }
}

impl FailureDetector {
  pub fn new(config: FailureDetectorConfig) -> Self {
    FailureDetector {
      config,
      failures: Mutex::new(Vec::new()),
      successes: Mutex::new(Vec::new()),
    }
  }

  pub fn record_failure(&self) {
    let mut failures = self.failures.lock();
    failures.push(Instant::now());
    prune(&mut failures, self.config.window);
  }

  pub fn record_success(&self) {
    let mut successes = self.successes.lock();
    successes.push(Instant::now());
    prune(&mut successes, self.config.window);
  }

  /// `true` once both `min_failures` and `failure_rate_threshold` are
  /// crossed within the window (spec §4.5.6, §4.6).
  pub fn should_fail_over(&self) -> bool {
    let mut failures = self.failures.lock();
    prune(&mut failures, self.config.window);
    let mut successes = self.successes.lock();
    prune(&mut successes, self.config.window);

    let failure_count = failures.len() as u32;
    if failure_count < self.config.min_failures {
      return false;
    }
    let total = failure_count as f64 + successes.len() as f64;
    if total == 0.0 {
      return false;
    }
    (failure_count as f64 / total) >= self.config.failure_rate_threshold
  }

  /// Clear both windows, e.g. after a failover has completed (spec §4.6:
  /// "reset after a successful failover").
  pub fn reset(&self) {
    self.failures.lock().clear();
    self.successes.lock().clear();
  }
}
