//! DNS multi-endpoint routing (spec §4.5.4): resolve a hostname to its A
//! records, pick one per acquisition by round-robin or random selection,
//! and cycle to the next IP on a connection error.

use crate::{
  connection::Connection,
  error::{Error, ErrorKind},
  protocol::command::Command,
  router::Route,
  types::{
    config::{Config, ConnectionConfig, Resolve},
    Value,
  },
};
use async_trait::async_trait;
use hickory_resolver::{config::{ResolverConfig, ResolverOpts}, TokioAsyncResolver};
use parking_lot::Mutex;
use std::{
  net::IpAddr,
  sync::atomic::{AtomicUsize, Ordering},
  time::Duration,
};

pub struct DnsRouter {
  hostname:        String,
  port:            u16,
  resolve:         Resolve,
  resolver:        TokioAsyncResolver,
  config:          Config,
  conn_cfg:        ConnectionConfig,
  acquire_timeout: Duration,
  reconnect_attempts: u32,
  addrs:           Mutex<Vec<IpAddr>>,
  cursor:          AtomicUsize,
}

impl DnsRouter {
  pub fn new(hostname: String, port: u16, resolve: Resolve, config: Config, conn_cfg: ConnectionConfig, acquire_timeout: Duration, reconnect_attempts: u32) -> Result<Self, Error> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    Ok(DnsRouter {
      hostname,
      port,
      resolve,
      resolver,
      config,
      conn_cfg,
      acquire_timeout,
      reconnect_attempts,
      addrs: Mutex::new(Vec::new()),
      cursor: AtomicUsize::new(0),
    })
  }

  /// Re-resolve the hostname and drop the cached IP list (spec §4.5.4
  /// `refresh_dns`).
  pub async fn refresh_dns(&self) -> Result<(), Error> {
    let response = self
      .resolver
      .lookup_ip(self.hostname.as_str())
      .await
      .map_err(|err| Error::new(ErrorKind::Discovery, err.to_string()))?;
    let addrs: Vec<IpAddr> = response.iter().collect();
    if addrs.is_empty() {
      return Err(Error::new(ErrorKind::Discovery, "DNS lookup returned no A/AAAA records"));
    }
    *self.addrs.lock() = addrs;
    Ok(())
  }

  async fn ensure_resolved(&self) -> Result<(), Error> {
    if self.addrs.lock().is_empty() {
      self.refresh_dns().await?;
    }
    Ok(())
  }

  fn pick(&self) -> IpAddr {
    let addrs = self.addrs.lock();
    match self.resolve {
      Resolve::RoundRobin => {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % addrs.len();
        addrs[idx]
      },
      Resolve::Random => addrs[rand::random::<usize>() % addrs.len()],
    }
  }

  async fn connect_one(&self) -> Result<Connection, Error> {
    self.ensure_resolved().await?;
    let mut last_err = None;
    let attempts = self.reconnect_attempts.max(1);
    for _ in 0 .. attempts {
      let ip = self.pick();
      let server = crate::types::config::Server::new(ip.to_string(), self.port);
      match Connection::connect(&server, &self.config, &self.conn_cfg).await {
        Ok(connection) => return Ok(connection),
        Err(err) => last_err = Some(err),
      }
    }
    Err(last_err.unwrap_or_else(Error::timeout))
  }
}

#[async_trait]
impl Route for DnsRouter {
  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let mut connection = tokio::time::timeout(self.acquire_timeout, self.connect_one()).await.map_err(|_| Error::timeout())??;
    connection.roundtrip(&command).await
  }

  async fn checkout(&self, _command: &Command) -> Result<crate::pool::Checkout, Error> {
    // DNS routing opens a fresh connection per acquisition rather than
    // drawing from a shared pool, so it has no `Checkout` to hand back;
    // callers that need a pinned connection for a pipeline/transaction
    // should not route DNS topologies through this method.
    Err(Error::new(ErrorKind::Config, "DNS routing does not support pinned checkouts"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn router() -> DnsRouter {
    DnsRouter::new(
      "example.invalid".into(),
      6379,
      Resolve::RoundRobin,
      Config::default(),
      ConnectionConfig::default(),
      Duration::from_secs(1),
      3,
    )
    .unwrap()
  }

  #[test]
  fn round_robin_cycles_through_every_address_before_repeating() {
    let router = router();
    *router.addrs.lock() = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap(), "10.0.0.3".parse().unwrap()];
    let picked: Vec<IpAddr> = (0 .. 4).map(|_| router.pick()).collect();
    assert_eq!(picked[0], picked[3], "the cursor must wrap back to the first address");
    assert_ne!(picked[0], picked[1]);
  }

  #[test]
  fn random_selection_always_picks_from_the_resolved_set() {
    let router = DnsRouter::new(
      "example.invalid".into(),
      6379,
      Resolve::Random,
      Config::default(),
      ConnectionConfig::default(),
      Duration::from_secs(1),
      3,
    )
    .unwrap();
    let set: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()];
    *router.addrs.lock() = set.clone();
    for _ in 0 .. 10 {
      assert!(set.contains(&router.pick()));
    }
  }
}
