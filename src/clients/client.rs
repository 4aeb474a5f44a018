//! The `Client` façade (spec §9): the generic `call` entry point plus
//! pipeline/transaction/tracking access, sitting on top of whichever
//! [`Route`] the [`crate::clients::Builder`] constructed.

use crate::{
  connection::{Connection, Pipeline, Transaction},
  error::{Error, ErrorKind},
  events::EventSink,
  metrics::{Metrics, MetricsSnapshot},
  pool::Checkout,
  protocol::command::Command,
  resilience::RetryPolicy,
  router::{
    centralized::CentralizedRouter, cluster::ClusterRouter, discovery::{DiscoveryConfig, DiscoveryRouter}, sentinel::SentinelRouter, Route,
  },
  tracking::{cache::Cache, scope::should_cache, CacheLookup},
  types::{
    config::{Config, ConnectionConfig, PerformanceConfig, ReconnectPolicy, ServerConfig, TrackingConfig},
    ConnectHandle, FromValue, Value,
  },
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};

/// A single direct (unpooled) connection, used for `ServerConfig::Unix`
/// (spec §4.2 "Unix socket with same-machine servers") — `pool::Pool` only
/// knows how to dial TCP/TLS, so a Unix-configured client talks to one
/// persistent connection instead of a pool of them.
struct UnixRouter {
  connection: tokio::sync::Mutex<Connection>,
}

#[async_trait]
impl Route for UnixRouter {
  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let mut guard = self.connection.lock().await;
    guard.roundtrip(&command).await
  }

  async fn checkout(&self, _command: &Command) -> Result<Checkout, Error> {
    Err(Error::new(ErrorKind::Config, "Unix-socket clients do not support pinned pool checkouts"))
  }
}

async fn build_router(
  config: &Config,
  conn_cfg: &ConnectionConfig,
  pool_size: usize,
  acquire_timeout: std::time::Duration,
  cache: Option<&Arc<Cache>>,
  metrics: &Arc<Metrics>,
  events: &EventSink,
) -> Result<Arc<dyn Route>, Error> {
  match &config.server {
    ServerConfig::Centralized { server } => {
      let pool = crate::pool::Pool::new(server.clone(), config.clone(), conn_cfg.clone(), pool_size);
      // Cluster/Sentinel/Discovery pools are discovered lazily against
      // nodes not known at construction time; wiring tracking/metrics
      // through them needs a creation hook on each of those routers, not
      // this pool directly. Centralized is the one topology where the pool
      // exists up front, so it's the one both are wired through today.
      pool.set_metrics(metrics.clone());
      if let Some(cache) = cache {
        pool.enable_tracking(cache.clone());
      }
      Ok(Arc::new(CentralizedRouter::new(pool, acquire_timeout)))
    },
    ServerConfig::Clustered { hosts, policy } => {
      let router = ClusterRouter::connect(
        hosts.clone(),
        config.clone(),
        conn_cfg.clone(),
        policy.clone(),
        Default::default(),
        pool_size,
        acquire_timeout,
      )
      .await?;
      Ok(Arc::new(router))
    },
    ServerConfig::Sentinel { hosts, service_name, .. } => {
      let sentinel_config = crate::router::sentinel::SentinelConfig {
        sentinels: hosts.clone(),
        service_name: service_name.clone(),
        role: crate::router::sentinel::SentinelRole::Master,
        min_other_sentinels: 0,
        #[cfg(feature = "sentinel-auth")]
        username: None,
        #[cfg(feature = "sentinel-auth")]
        password: None,
      };
      Ok(Arc::new(SentinelRouter::new(sentinel_config, config.clone(), conn_cfg.clone(), pool_size, acquire_timeout)))
    },
    #[cfg(feature = "unix-sockets")]
    ServerConfig::Unix { path } => {
      let connection = Connection::connect_unix(path, config, conn_cfg).await?;
      Ok(Arc::new(UnixRouter {
        connection: tokio::sync::Mutex::new(connection),
      }))
    },
    #[cfg(feature = "dns")]
    ServerConfig::Dns { hostname, port, resolve, reconnect_attempts } => {
      let router = crate::router::dns::DnsRouter::new(
        hostname.clone(),
        *port,
        *resolve,
        config.clone(),
        conn_cfg.clone(),
        acquire_timeout,
        *reconnect_attempts,
      )?;
      Ok(Arc::new(router))
    },
    ServerConfig::Discovery { seeds, database, internal } => {
      let discovery_config = DiscoveryConfig {
        seeds:    seeds.clone(),
        database: database.clone(),
        internal: *internal,
      };
      Ok(Arc::new(DiscoveryRouter::new(discovery_config, config.clone(), conn_cfg.clone(), pool_size, acquire_timeout)))
    },
    ServerConfig::ActiveActive { regions } => {
      let router = Arc::new(crate::router::active_active::ActiveActiveRouter::new(
        regions.clone(),
        config.clone(),
        conn_cfg.clone(),
        pool_size,
        acquire_timeout,
        crate::resilience::HealthCheckConfig::default(),
        crate::resilience::FailureDetectorConfig::default(),
        events.clone(),
      ));
      router.start_health_checks();
      Ok(router)
    },
  }
}

struct Inner {
  config:           Config,
  conn_cfg:         ConnectionConfig,
  perf_cfg:         PerformanceConfig,
  tracking_cfg:     Option<TrackingConfig>,
  reconnect_policy: Option<ReconnectPolicy>,
  pool_size:        usize,
  router:           OnceCell<Arc<dyn Route>>,
  cache:            OnceCell<Arc<Cache>>,
  metrics:          Arc<Metrics>,
  events:           EventSink,
  retry:            RetryPolicy,
  ready_tx:         watch::Sender<bool>,
  ready_rx:         watch::Receiver<bool>,
}

/// The client surface every call goes through: one generic `call<T>` entry
/// point plus pipeline/transaction access and (when enabled) the tracking
/// cache. Cheap to clone — every clone shares the same router, cache, and
/// instrumentation sinks.
#[derive(Clone)]
pub struct Client {
  inner: Arc<Inner>,
}

impl Client {
  pub(crate) fn new(
    config: Config,
    conn_cfg: ConnectionConfig,
    perf_cfg: PerformanceConfig,
    tracking_cfg: Option<TrackingConfig>,
    reconnect_policy: Option<ReconnectPolicy>,
    pool_size: usize,
    events: EventSink,
  ) -> Self {
    let (ready_tx, ready_rx) = watch::channel(false);
    Client {
      inner: Arc::new(Inner {
        config,
        conn_cfg,
        perf_cfg,
        tracking_cfg,
        reconnect_policy,
        pool_size,
        router: OnceCell::new(),
        cache: OnceCell::new(),
        metrics: Arc::new(Metrics::default()),
        events,
        retry: RetryPolicy::default(),
        ready_tx,
        ready_rx,
      }),
    }
  }

  pub fn connection_config(&self) -> &ConnectionConfig {
    &self.inner.conn_cfg
  }

  pub fn perf_config(&self) -> &PerformanceConfig {
    &self.inner.perf_cfg
  }

  pub fn client_reconnect_policy(&self) -> Option<ReconnectPolicy> {
    self.inner.reconnect_policy.clone()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.inner.metrics.snapshot()
  }

  pub fn events(&self) -> EventSink {
    self.inner.events.clone()
  }

  /// Build the router (and, if configured, the tracking cache) in the
  /// background and return a handle that resolves once that background work
  /// either finishes or fails unrecoverably.
  pub fn connect(&self) -> ConnectHandle {
    let inner = self.inner.clone();
    tokio::spawn(async move {
      // Build the cache before the router so a `ServerConfig::Centralized`
      // pool can be told to enable tracking on every connection it dials,
      // rather than racing a router that's already created connections.
      let cache = inner.tracking_cfg.clone().map(|cfg| Arc::new(Cache::new(cfg, inner.metrics.clone())));
      let result = build_router(
        &inner.config,
        &inner.conn_cfg,
        inner.pool_size,
        inner.conn_cfg.connect_timeout,
        cache.as_ref(),
        &inner.metrics,
        &inner.events,
      )
      .await;
      match result {
        Ok(router) => {
          let _ = inner.router.set(router);
          if let Some(cache) = cache {
            let _ = inner.cache.set(cache);
          }
          let _ = inner.ready_tx.send(true);
          Ok(())
        },
        Err(err) => Err(err),
      }
    })
  }

  /// Block until [`Self::connect`]'s background task has installed a router,
  /// surfacing `fail_fast` configuration errors synchronously to the caller
  /// that's awaiting connect rather than to the detached join handle.
  pub async fn wait_for_connect(&self) -> Result<(), Error> {
    let mut rx = self.inner.ready_rx.clone();
    if *rx.borrow() {
      return Ok(());
    }
    rx.changed().await.map_err(|_| Error::new(ErrorKind::Canceled, "client was dropped before it finished connecting"))?;
    Ok(())
  }

  fn router(&self) -> Result<&Arc<dyn Route>, Error> {
    self.inner.router.get().ok_or_else(|| Error::new(ErrorKind::Config, "client is not connected yet — call connect() first"))
  }

  /// Whether tracking (spec §4.7) was enabled on this client.
  pub fn is_tracking(&self) -> bool {
    self.inner.cache.get().is_some()
  }

  /// Dispatch one command, transparently serving it from (and populating)
  /// the tracking cache when enabled and eligible (spec §4.7).
  pub async fn call<T: FromValue>(&self, command: Command) -> Result<T, Error> {
    let value = self.dispatch(command).await?;
    T::from_value(value)
  }

  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let router = self.router()?.clone();

    let Some(cache) = self.inner.cache.get() else {
      return self.retry_dispatch(router, command).await;
    };

    let Some(key) = command.cluster_key() else {
      return self.retry_dispatch(router, command).await;
    };
    let caching_yes_pending = crate::tracking::scope::take_caching_yes();
    let mode = self.inner.tracking_cfg.as_ref().map(|c| c.mode).unwrap_or(crate::types::config::TrackingMode::Default);
    if !command.is_read || !should_cache(mode, caching_yes_pending) {
      return self.retry_dispatch(router, command).await;
    }

    let redis_key = crate::types::Key::from(bytes::Bytes::copy_from_slice(key));
    let cache_key = Cache::cache_key(&command.name, key, &[]);
    if let CacheLookup::Hit(value) = cache.get(&cache_key) {
      return Ok(value);
    }

    cache.mark_in_progress(&cache_key, &redis_key);
    let result = self.retry_dispatch(router, command).await;
    if let Ok(value) = &result {
      cache.store(&cache_key, &redis_key, value.clone());
    }
    result
  }

  async fn retry_dispatch(&self, router: Arc<dyn Route>, command: Command) -> Result<Value, Error> {
    if command.no_retry {
      return router.dispatch(command).await;
    }
    self.inner.retry.retry(|| { let router = router.clone(); let command = command.clone(); async move { router.dispatch(command).await } }, |_| {}).await
  }

  /// Acquire a connection pinned for the lifetime of `f`, so the pipeline
  /// or transaction it builds executes entirely against one connection
  /// (spec §4.3).
  pub async fn with_pinned_connection<F, Fut, T>(&self, command_hint: &Command, f: F) -> Result<T, Error>
  where
    F: FnOnce(&mut Connection) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
  {
    let router = self.router()?.clone();
    let mut checkout = router.checkout(command_hint).await?;
    f(&mut checkout).await
  }

  /// `WATCH` one or more keys, then run `f` pinned to the connection that
  /// issued the `WATCH` for the rest of the scope — `f` is expected to build
  /// and `exec`/`discard` a [`Transaction`] against the connection it's
  /// handed (spec §4.3, §4.5.3 "WATCH/MULTI/EXEC in a cluster").
  ///
  /// On a [`ServerConfig::Clustered`] client, every watched key must map to
  /// the same cluster hash slot; a mismatch raises [`ErrorKind::CrossSlot`]
  /// synchronously, before any connection is touched, rather than
  /// surfacing as a server-side `CROSSSLOT` error — and the connection is
  /// then pinned via [`Route::checkout`] to the node that owns that slot
  /// (the same `Command::pin_slot` a `MOVED`/`ASK` target would carry).
  /// Every other topology has no slot concept, so the same multi-key
  /// `WATCH` is passed straight through to whichever one connection
  /// `checkout` hands out. `UNWATCH` is issued once `f` returns, regardless
  /// of outcome, so a pooled connection is never handed back to another
  /// caller still holding watches from this scope — harmless if `f`
  /// already resolved them via `EXEC`/`DISCARD`.
  pub async fn watch<F, Fut, T>(&self, keys: &[&[u8]], f: F) -> Result<T, Error>
  where
    F: FnOnce(&mut Connection) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
  {
    if keys.is_empty() {
      return Err(Error::new(ErrorKind::Config, "WATCH requires at least one key"));
    }

    let mut watch_cmd = Command::new("WATCH").args(keys.iter().map(|k| bytes::Bytes::copy_from_slice(k)));
    if matches!(self.inner.config.server, crate::types::config::ServerConfig::Clustered { .. }) {
      let slot = crate::protocol::hashers::shared_slot(keys.iter().copied())
        .ok_or_else(|| Error::new(ErrorKind::CrossSlot, "WATCH keys must map to the same cluster hash slot"))?;
      watch_cmd = watch_cmd.pin_slot(slot);
    }

    let router = self.router()?.clone();
    let mut checkout = router.checkout(&watch_cmd).await?;
    checkout.roundtrip(&watch_cmd).await?;

    let result = f(&mut checkout).await;
    let _ = checkout.roundtrip(&crate::protocol::cmd0("UNWATCH")).await;
    result
  }

  pub async fn ping(&self) -> Result<(), Error> {
    self.call::<()>(crate::protocol::cmd0("PING")).await
  }

  pub async fn quit(&self) -> Result<(), Error> {
    Ok(())
  }
}

/// A pinned session over one checked-out connection, exposing the same
/// pipeline/transaction surface the teacher's `Client` hands out via
/// `client.pipeline()`/`client.multi()`, but scoped to a single explicit
/// checkout rather than hidden behind the façade.
pub struct Session {
  checkout: Mutex<Checkout>,
}

impl Session {
  pub fn new(checkout: Checkout) -> Self {
    Session { checkout: Mutex::new(checkout) }
  }

  pub fn pipeline(&self) -> PipelineGuard<'_> {
    PipelineGuard { checkout: self.checkout.lock() }
  }
}

/// Borrows the held connection long enough to build and run a [`Pipeline`]
/// or [`Transaction`] against it.
pub struct PipelineGuard<'s> {
  checkout: parking_lot::MutexGuard<'s, Checkout>,
}

impl<'s> PipelineGuard<'s> {
  pub fn queue(&mut self) -> Pipeline<'_> {
    Pipeline::new(&mut *self.checkout)
  }

  pub fn transaction(&mut self) -> Transaction<'_> {
    Transaction::new(&mut *self.checkout)
  }
}
