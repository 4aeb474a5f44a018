//! Active-Active multiplex routing (spec §4.5.6): several database
//! endpoints in different regions, each continuously health-checked, with a
//! sliding-window failure detector deciding when to fail the active region
//! over to the next healthy one.

use crate::{
  error::Error,
  events::{Event, EventSink},
  pool::{Checkout, Pool},
  protocol::command::Command,
  resilience::{FailureDetector, FailureDetectorConfig, HealthCheckConfig, HealthChecker},
  router::Route,
  types::{
    config::{Config, ConnectionConfig, Server},
    Value,
  },
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  time::{Duration, SystemTime},
};

pub struct ActiveActiveRouter {
  regions:         Vec<Server>,
  pools:           Vec<Pool>,
  active:          AtomicUsize,
  health:          Arc<HealthChecker>,
  detector:        FailureDetector,
  events:          EventSink,
  acquire_timeout: Duration,
  _health_task:    Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ActiveActiveRouter {
  pub fn new(
    regions: Vec<Server>,
    server_config: Config,
    conn_cfg: ConnectionConfig,
    pool_size: usize,
    acquire_timeout: Duration,
    health_config: HealthCheckConfig,
    detector_config: FailureDetectorConfig,
    events: EventSink,
  ) -> Self {
    let pools = regions.iter().map(|s| Pool::new(s.clone(), server_config.clone(), conn_cfg.clone(), pool_size)).collect();
    let health = Arc::new(HealthChecker::new(health_config, regions.clone()));

    ActiveActiveRouter {
      regions,
      pools,
      active: AtomicUsize::new(0),
      health,
      detector: FailureDetector::new(detector_config),
      events,
      acquire_timeout,
      _health_task: Mutex::new(None),
    }
  }

  /// Start the background health-check loop, probing each region with a
  /// plain `PING` roundtrip against its pool.
  pub fn start_health_checks(self: &Arc<Self>) {
    let this = self.clone();
    let pools = self.pools.clone();
    let regions = self.regions.clone();
    let health = self.health.clone();
    let handle = health.spawn(move |server| {
      let pools = pools.clone();
      let regions = regions.clone();
      let this = this.clone();
      async move {
        let idx = match regions.iter().position(|r| *r == server) {
          Some(idx) => idx,
          None => return false,
        };
        let acquire_timeout = this.acquire_timeout;
        let healthy = pools[idx]
          .with(acquire_timeout, |connection| async move { connection.ping().await })
          .await
          .is_ok();
        healthy
      }
    });
    *self._health_task.lock() = Some(handle);
  }

  fn active_index(&self) -> usize {
    self.active.load(Ordering::Acquire)
  }

  fn active_pool(&self) -> &Pool {
    &self.pools[self.active_index()]
  }

  /// Pick the next healthy region after the current active one, wrapping
  /// around (spec §4.5.6: "fails over to the next healthy region").
  fn next_healthy(&self) -> Option<usize> {
    let current = self.active_index();
    (1 ..= self.regions.len()).map(|offset| (current + offset) % self.regions.len()).find(|&idx| self.health.is_healthy(&self.regions[idx]))
  }

  /// Fail over to the next healthy region if the failure detector says so,
  /// emitting `Event::Failover`. Idempotent no-op if no other region is
  /// currently healthy.
  fn maybe_fail_over(&self) {
    if !self.detector.should_fail_over() {
      return;
    }
    let Some(next) = self.next_healthy() else { return };
    let current = self.active_index();
    if next == current {
      return;
    }
    self.active.store(next, Ordering::Release);
    self.detector.reset();
    self.events.emit(Event::Failover {
      from:      self.regions[current].clone(),
      to:        self.regions[next].clone(),
      timestamp: SystemTime::now(),
    });
  }
}

#[async_trait]
impl Route for ActiveActiveRouter {
  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let timeout = self.acquire_timeout;
    let pool = self.active_pool().clone();
    let cmd = command.clone();
    let result = pool.with(timeout, move |connection| async move { connection.roundtrip(&cmd).await }).await;

    match &result {
      Ok(_) => self.detector.record_success(),
      Err(err) if err.is_retryable() => {
        self.detector.record_failure();
        self.maybe_fail_over();
      },
      Err(_) => {},
    }

    result
  }

  async fn checkout(&self, _command: &Command) -> Result<Checkout, Error> {
    self.active_pool().acquire(self.acquire_timeout).await
  }
}

impl ActiveActiveRouter {
  /// Whether every configured region has been marked unhealthy (spec
  /// §4.5.6's implicit "no remaining failover target" case).
  pub fn all_regions_down(&self) -> bool {
    self.regions.iter().all(|r| !self.health.is_healthy(r))
  }
}
