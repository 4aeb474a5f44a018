//! Redis Enterprise Discovery Service lookup (spec §4.5.5): a
//! Sentinel-shaped lookup against port 8001.

use crate::{
  connection::Connection,
  error::{Error, ErrorKind},
  pool::{Checkout, Pool},
  protocol::{cmd2, command::Command},
  router::Route,
  types::{
    config::{Config, ConnectionConfig, Server},
    Value,
  },
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

pub const DISCOVERY_SERVICE_PORT: u16 = 8001;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
  pub seeds:    Vec<Server>,
  pub database: String,
  /// Use the internal (cluster-private) address variant:
  /// `SENTINEL get-master-addr-by-name <db>@internal`.
  pub internal: bool,
}

pub struct DiscoveryRouter {
  config:          DiscoveryConfig,
  server_config:   Config,
  conn_cfg:        ConnectionConfig,
  pool_size:       usize,
  acquire_timeout: Duration,
  current_pool:    Mutex<Option<Pool>>,
}

impl DiscoveryRouter {
  pub fn new(config: DiscoveryConfig, server_config: Config, conn_cfg: ConnectionConfig, pool_size: usize, acquire_timeout: Duration) -> Self {
    DiscoveryRouter {
      config,
      server_config,
      conn_cfg,
      pool_size,
      acquire_timeout,
      current_pool: Mutex::new(None),
    }
  }

  fn lookup_name(&self) -> String {
    if self.config.internal {
      format!("{}@internal", self.config.database)
    } else {
      self.config.database.clone()
    }
  }

  /// Iterate the seed list, querying each on port 8001, returning the first
  /// successful `{host, port}` (spec §4.5.5).
  async fn discover(&self) -> Result<Server, Error> {
    let name = self.lookup_name();
    let mut last_err = None;

    for seed in &self.config.seeds {
      let probe = Server::new(seed.host.clone(), DISCOVERY_SERVICE_PORT);
      let attempt = async {
        let mut connection = Connection::connect(&probe, &Config::default(), &self.conn_cfg).await?;
        let reply = connection.roundtrip(&cmd2("SENTINEL", "get-master-addr-by-name", name.as_str())).await?;
        let items = reply.into_array().ok_or_else(|| Error::new(ErrorKind::Discovery, "unexpected get-master-addr-by-name reply shape"))?;
        if items.len() < 2 {
          return Err(Error::new(ErrorKind::Discovery, "incomplete get-master-addr-by-name reply"));
        }
        let host = items[0].as_bytes().map(|b| String::from_utf8_lossy(b).into_owned()).ok_or_else(|| Error::new(ErrorKind::Discovery, "missing host"))?;
        let port: u16 = items[1].as_i64().ok_or_else(|| Error::new(ErrorKind::Discovery, "missing port"))? as u16;
        Ok::<Server, Error>(Server::new(host, port))
      }
      .await;

      match attempt {
        Ok(server) => return Ok(server),
        Err(err) => last_err = Some(err),
      }
    }

    Err(last_err.unwrap_or_else(|| Error::new(ErrorKind::Discovery, "no discovery service seed answered")))
  }

  async fn refresh_pool(&self) -> Result<Pool, Error> {
    let server = self.discover().await?;
    let pool = Pool::new(server, self.server_config.clone(), self.conn_cfg.clone(), self.pool_size);
    *self.current_pool.lock() = Some(pool.clone());
    Ok(pool)
  }

  async fn current_or_refresh(&self) -> Result<Pool, Error> {
    if let Some(pool) = self.current_pool.lock().clone() {
      return Ok(pool);
    }
    self.refresh_pool().await
  }
}

#[async_trait]
impl Route for DiscoveryRouter {
  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let pool = self.current_or_refresh().await?;
    let timeout = self.acquire_timeout;
    pool.with(timeout, move |connection| async move { connection.roundtrip(&command).await }).await
  }

  async fn checkout(&self, _command: &Command) -> Result<Checkout, Error> {
    let pool = self.current_or_refresh().await?;
    pool.acquire(self.acquire_timeout).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn router(internal: bool) -> DiscoveryRouter {
    DiscoveryRouter::new(
      DiscoveryConfig {
        seeds:    vec![Server::new("127.0.0.1", 9999)],
        database: "mydb".into(),
        internal,
      },
      Config::default(),
      ConnectionConfig::default(),
      4,
      Duration::from_secs(1),
    )
  }

  #[test]
  fn lookup_name_appends_internal_suffix_only_when_requested() {
    assert_eq!(router(false).lookup_name(), "mydb");
    assert_eq!(router(true).lookup_name(), "mydb@internal");
  }
}
