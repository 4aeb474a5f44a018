//! L3: a bounded pool of connections to a single logical endpoint (spec
//! §4.4). Routing (which endpoint a command belongs to) lives one layer up
//! in `router`; this module only knows how to hand out and take back
//! connections to the one server it was built for.

use crate::{
  connection::{Connection, ConnectionState},
  error::Error,
  metrics::Metrics,
  tracking::{cache::tracking_on_command, Cache},
  types::config::{Config, ConnectionConfig, Server},
};
use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A connection on loan from a [`Pool`]. Returns itself to the pool's idle
/// list on drop unless it was explicitly poisoned (spec §4.4: "a checked-out
/// connection that errors is never returned to the idle list").
pub struct Checkout {
  connection: Option<Connection>,
  pool:       Arc<Inner>,
  poisoned:   bool,
}

impl Checkout {
  pub fn poison(&mut self) {
    self.poisoned = true;
  }
}

impl std::ops::Deref for Checkout {
  type Target = Connection;

  fn deref(&self) -> &Connection {
    self.connection.as_ref().expect("connection taken before drop")
  }
}

impl std::ops::DerefMut for Checkout {
  fn deref_mut(&mut self) -> &mut Connection {
    self.connection.as_mut().expect("connection taken before drop")
  }
}

impl Drop for Checkout {
  fn drop(&mut self) {
    if let Some(mut connection) = self.connection.take() {
      self.pool.metrics.load().record_release();
      if self.poisoned || connection.is_poisoned_by_fork() {
        self.pool.permits.add_permits(1);
        return;
      }
      connection.set_state(ConnectionState::Idle);
      self.pool.idle.lock().push_back(connection);
      self.pool.permits.add_permits(1);
    }
  }
}

struct Inner {
  server:     Server,
  config:     Config,
  conn_cfg:   ConnectionConfig,
  idle: Mutex<std::collections::VecDeque<Connection>>,
  permits:    Semaphore,
  max_size:   usize,
  /// Set once, before the pool creates its first connection (spec §4.7
  /// "Enablement"): every connection this pool dials issues `CLIENT
  /// TRACKING ON` as part of its prelude and feeds its push queue into this
  /// cache for the lifetime of the connection.
  tracking: ArcSwapOption<Cache>,
  /// Defaults to a pool-local sink; `Pool::set_metrics` swaps in a sink
  /// shared with the owning `Client` so `Client::metrics()` reflects this
  /// pool's checkouts/releases/exhaustion (spec §4.4, L7 instrumentation).
  metrics: ArcSwap<Metrics>,
}

/// A bounded pool of connections to one server. Checkout fairness comes
/// from `tokio::sync::Semaphore`'s own FIFO waiter queue (spec §4.4: "no
/// waiter is skipped ahead of an earlier one").
#[derive(Clone)]
pub struct Pool {
  inner: Arc<Inner>,
}

impl Pool {
  pub fn new(server: Server, config: Config, conn_cfg: ConnectionConfig, max_size: usize) -> Self {
    Pool {
      inner: Arc::new(Inner {
        server,
        config,
        conn_cfg,
        idle: Mutex::new(std::collections::VecDeque::with_capacity(max_size)),
        permits: Semaphore::new(max_size),
        max_size,
        tracking: ArcSwapOption::empty(),
        metrics: ArcSwap::new(Arc::new(Metrics::default())),
      }),
    }
  }

  /// Share `metrics` with this pool's checkout/release/exhaustion counters
  /// instead of the pool-local sink it starts with. Must be called before
  /// the first `acquire()` to cover every counted event.
  pub fn set_metrics(&self, metrics: Arc<Metrics>) {
    self.inner.metrics.store(metrics);
  }

  pub fn server(&self) -> &Server {
    &self.inner.server
  }

  pub fn max_size(&self) -> usize {
    self.inner.max_size
  }

  /// Enable client-side tracking on every connection this pool dials from
  /// now on (spec §4.7). Connections already idle in the pool were not
  /// dialed with tracking on and are not retroactively upgraded — this must
  /// be called before the pool's first `acquire()` to cover every
  /// connection, which is how `clients::Client::connect` uses it.
  pub fn enable_tracking(&self, cache: Arc<Cache>) {
    self.inner.tracking.store(Some(cache));
  }

  /// Number of connections currently idle (not checked out).
  pub fn idle_len(&self) -> usize {
    self.inner.idle.lock().len()
  }

  /// Acquire a connection, waiting up to `acquire_timeout` for either an
  /// idle connection or room to open a new one. A fresh connection is
  /// opened lazily on a pool miss rather than the pool pre-warming its full
  /// capacity (spec §4.4, "connections are opened on demand up to the
  /// configured maximum").
  pub async fn acquire(&self, acquire_timeout: std::time::Duration) -> Result<Checkout, Error> {
    let wait_started = std::time::Instant::now();
    let permit = tokio::time::timeout(acquire_timeout, self.inner.permits.acquire())
      .await
      .map_err(|_| {
        self.inner.metrics.load().record_pool_exhausted();
        Error::pool_exhausted()
      })?
      .map_err(|_| Error::pool_exhausted())?;
    permit.forget();
    self.inner.metrics.load().record_checkout(wait_started.elapsed());

    loop {
      let candidate = self.inner.idle.lock().pop_front();

      match candidate {
        Some(connection) if !connection.is_poisoned_by_fork() => {
          let mut connection = connection;
          connection.set_state(ConnectionState::InUse);
          return Ok(Checkout {
            connection: Some(connection),
            pool:       self.inner.clone(),
            poisoned:   false,
          });
        },
        Some(_poisoned) => continue, // forked connection: drop it and try the next idle one
        None => {
          let mut connection = Connection::connect(&self.inner.server, &self.inner.config, &self.inner.conn_cfg).await?;
          if let Some(cache) = self.inner.tracking.load_full() {
            connection.roundtrip(&tracking_on_command(cache.config())).await?;
            tokio::spawn(crate::tracking::consumer::run_invalidation_consumer(cache, connection.subscribe_push()));
          }
          connection.set_state(ConnectionState::InUse);
          return Ok(Checkout {
            connection: Some(connection),
            pool:       self.inner.clone(),
            poisoned:   false,
          });
        },
      }
    }
  }

  /// Run `f` against a checked-out connection, returning the connection to
  /// the idle list afterward regardless of success. Only transport-level and
  /// protocol failures poison the connection (spec §4.4: "poisons the
  /// connection on transport-level errors") — a server error reply such as
  /// `WRONGTYPE` or a cluster `MOVED`/`ASK` redirection says nothing about
  /// the connection's own health and must not discard it.
  pub async fn with<F, Fut, T>(&self, acquire_timeout: std::time::Duration, f: F) -> Result<T, Error>
  where
    F: FnOnce(&mut Connection) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
  {
    let mut checkout = self.acquire(acquire_timeout).await?;
    let result = f(&mut checkout).await;
    if let Err(err) = &result {
      if matches!(err.kind(), crate::error::ErrorKind::Io | crate::error::ErrorKind::Timeout | crate::error::ErrorKind::Protocol) {
        checkout.poison();
      }
    }
    result
  }
}
