//! Fluent client construction (spec §9's `types::Builder`, carried forward
//! as `clients::Builder`): gather config pieces, then hand out one
//! [`Client`] or a round-robin [`Pool`] of them.

use crate::{
  clients::{client::Client, pool::Pool},
  error::{Error, ErrorKind},
  events::EventSink,
  types::config::{Config, ConnectionConfig, PerformanceConfig, ReconnectPolicy, TrackingConfig},
};

/// Accumulates the pieces [`Client::new`] needs before producing one or
/// more clients that all share the same configuration.
pub struct Builder {
  config:           Config,
  connection_config: ConnectionConfig,
  performance_config: PerformanceConfig,
  tracking_config:  Option<TrackingConfig>,
  reconnect_policy: Option<ReconnectPolicy>,
  events_capacity:  usize,
  pool_size:        usize,
}

impl Builder {
  pub fn from_config(config: Config) -> Self {
    Builder {
      config,
      connection_config: ConnectionConfig::default(),
      performance_config: PerformanceConfig::default(),
      tracking_config: None,
      reconnect_policy: None,
      events_capacity: 256,
      pool_size: 10,
    }
  }

  /// Size of the L3 connection pool (spec §4.4) each built client draws
  /// connections from. Unrelated to [`Self::build_pool`]'s client count.
  pub fn set_pool_size(mut self, pool_size: usize) -> Self {
    self.pool_size = pool_size.max(1);
    self
  }

  pub fn set_connection_config(mut self, connection_config: ConnectionConfig) -> Self {
    self.connection_config = connection_config;
    self
  }

  pub fn set_performance_config(mut self, performance_config: PerformanceConfig) -> Self {
    self.performance_config = performance_config;
    self
  }

  pub fn set_policy(mut self, reconnect_policy: ReconnectPolicy) -> Self {
    self.reconnect_policy = Some(reconnect_policy);
    self
  }

  #[cfg(feature = "tracking")]
  pub fn set_tracking_config(mut self, tracking_config: TrackingConfig) -> Self {
    self.tracking_config = Some(tracking_config);
    self
  }

  /// Capacity of the `EventSink`'s broadcast channel (spec §6); a lagging
  /// subscriber drops its oldest unread events rather than blocking senders.
  pub fn set_events_capacity(mut self, capacity: usize) -> Self {
    self.events_capacity = capacity;
    self
  }

  fn new_client(&self, events: EventSink) -> Client {
    Client::new(
      self.config.clone(),
      self.connection_config.clone(),
      self.performance_config.clone(),
      self.tracking_config.clone(),
      self.reconnect_policy.clone(),
      self.pool_size,
      events,
    )
  }

  pub fn build(&self) -> Result<Client, Error> {
    Ok(self.new_client(EventSink::new(self.events_capacity)))
  }

  /// Build a round-robin [`Pool`] of `size` independently-connected clients
  /// (spec §4.4, "a pool is a fixed number of otherwise-identical clients
  /// to the same logical endpoint").
  pub fn build_pool(&self, size: usize) -> Result<Pool, Error> {
    if size == 0 {
      return Err(Error::new(ErrorKind::Config, "pool size must be at least 1"));
    }
    let events = EventSink::new(self.events_capacity);
    let clients = (0 .. size).map(|_| self.new_client(events.clone())).collect();
    Ok(Pool::new(clients))
  }
}
