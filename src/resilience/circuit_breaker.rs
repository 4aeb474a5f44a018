//! Three-state circuit breaker (spec §4.6, §8): CLOSED → OPEN on a run of
//! failures, OPEN fails fast until `reset_timeout` elapses, then one
//! HALF_OPEN trial run of calls decides whether to close again or reopen.
//!
//! Monotonic time only (`Instant`), per spec §3 ("unaffected by wall-clock
//! adjustments") — `opened_at` is never compared against wall-clock time.

use crate::error::Error;
use parking_lot::Mutex;
use std::{
  future::Future,
  time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
  Closed,
  Open,
  HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
  pub failure_threshold: u32,
  pub success_threshold: u32,
  pub reset_timeout:     Duration,
}

impl Default for CircuitBreakerConfig {
  fn default() -> Self {
    CircuitBreakerConfig {
      failure_threshold: 5,
      success_threshold: 2,
      reset_timeout:     Duration::from_secs(60),
    }
  }
}

struct Inner {
  state:            BreakerState,
  failure_count:    u32,
  success_count:    u32,
  opened_at:        Option<Instant>,
  transition_count: u64,
}

/// A snapshot of the breaker's counters at the moment of a state
/// transition, carried on the emitted event (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct BreakerMetrics {
  pub failure_count:    u32,
  pub success_count:    u32,
  pub transition_count: u64,
}

/// A state-transition notification: `(old, new, metrics)`.
pub type Transition = (BreakerState, BreakerState, BreakerMetrics);

pub struct CircuitBreaker {
  config:    CircuitBreakerConfig,
  inner:     Mutex<Inner>,
  listeners: Mutex<Vec<Box<dyn Fn(Transition) + Send + Sync>>>,
}

impl CircuitBreaker {
  pub fn new(config: CircuitBreakerConfig) -> Self {
    CircuitBreaker {
      config,
      inner: Mutex::new(Inner {
        state:            BreakerState::Closed,
        failure_count:    0,
        success_count:    0,
        opened_at:        None,
        transition_count: 0,
      }),
      listeners: Mutex::new(Vec::new()),
    }
  }

  pub fn on_transition(&self, listener: impl Fn(Transition) + Send + Sync + 'static) {
    self.listeners.lock().push(Box::new(listener));
  }

  pub fn state(&self) -> BreakerState {
    self.lazily_half_open();
    self.inner.lock().state
  }

  /// Move OPEN → HALF_OPEN if `reset_timeout` has elapsed. Checked lazily on
  /// every read rather than by a background timer (spec §4.6: "checked
  /// lazily on the next call").
  fn lazily_half_open(&self) {
    let mut inner = self.inner.lock();
    if inner.state == BreakerState::Open {
      if let Some(opened_at) = inner.opened_at {
        if opened_at.elapsed() >= self.config.reset_timeout {
          self.transition(&mut inner, BreakerState::HalfOpen);
        }
      }
    }
  }

  fn transition(&self, inner: &mut Inner, new_state: BreakerState) {
    let old_state = inner.state;
    if old_state == new_state {
      return;
    }
    inner.state = new_state;
    inner.transition_count += 1;
    inner.failure_count = 0;
    inner.success_count = 0;
    if new_state == BreakerState::Open {
      inner.opened_at = Some(Instant::now());
    }
    let metrics = BreakerMetrics {
      failure_count:    inner.failure_count,
      success_count:    inner.success_count,
      transition_count: inner.transition_count,
    };
    let listeners = self.listeners.lock();
    for listener in listeners.iter() {
      listener((old_state, new_state, metrics));
    }
  }

  pub fn record_success(&self) {
    let mut inner = self.inner.lock();
    match inner.state {
      BreakerState::Closed => inner.failure_count = 0,
      BreakerState::HalfOpen => {
        inner.success_count += 1;
        if inner.success_count >= self.config.success_threshold {
          self.transition(&mut inner, BreakerState::Closed);
        }
      },
      BreakerState::Open => {},
    }
  }

  pub fn record_failure(&self) {
    let mut inner = self.inner.lock();
    match inner.state {
      BreakerState::Closed => {
        inner.failure_count += 1;
        if inner.failure_count >= self.config.failure_threshold {
          self.transition(&mut inner, BreakerState::Open);
        }
      },
      BreakerState::HalfOpen => self.transition(&mut inner, BreakerState::Open),
      BreakerState::Open => {},
    }
  }

  /// Run `f` guarded by the breaker: fails fast with
  /// [`Error::circuit_open`] while OPEN, otherwise runs `f` and records the
  /// outcome.
  pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, Error>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
  {
    if self.state() == BreakerState::Open {
      return Err(Error::circuit_open());
    }
    match f().await {
      Ok(value) => {
        self.record_success();
        Ok(value)
      },
      Err(err) => {
        self.record_failure();
        Err(err)
      },
    }
  }

  /// Same as [`Self::call`], but returns `fallback` instead of
  /// `CircuitBreakerOpenError` while OPEN (spec §4.6: "or invokes a provided
  /// fallback").
  pub async fn call_or_fallback<F, Fut, T>(&self, f: F, fallback: impl FnOnce() -> T) -> Result<T, Error>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
  {
    if self.state() == BreakerState::Open {
      return Ok(fallback());
    }
    match f().await {
      Ok(value) => {
        self.record_success();
        Ok(value)
      },
      Err(err) => {
        self.record_failure();
        Err(err)
      },
    }
  }
}
