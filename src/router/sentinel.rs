//! Sentinel routing (spec §4.5.2): discover the current master/replica
//! endpoint through a list of Sentinels, verify its role, and rediscover on
//! a `READONLY`-shaped demotion.

use crate::{
  connection::Connection,
  error::{Error, ErrorKind},
  pool::{Checkout, Pool},
  protocol::{cmd1, cmd2, command::Command},
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
  time::Duration,
};

/// Which node class a Sentinel-routed client resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelRole {
  Master,
  Replica,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
  pub sentinels:         Vec<Server>,
  pub service_name:      String,
  pub role:              SentinelRole,
  pub min_other_sentinels: u32,
  #[cfg(feature = "sentinel-auth")]
  pub username: Option<String>,
  #[cfg(feature = "sentinel-auth")]
  pub password: Option<String>,
}

/// Parse a `SENTINEL MASTERS`/`SENTINEL REPLICAS` entry (a flat field/value
/// array) into the handful of fields the discovery algorithm needs.
struct SentinelEntry {
  name:              Option<String>,
  ip:                Option<String>,
  port:              Option<u16>,
  flags:             String,
  role_reported:     Option<String>,
  num_other_sentinels: u32,
}

fn parse_entry(value: &Value) -> Option<SentinelEntry> {
  let items: Vec<Value> = match value {
    Value::Array(Some(items)) => items.clone(),
    Value::Map(pairs) => pairs.iter().flat_map(|(k, v)| [k.clone(), v.clone()]).collect(),
    _ => return None,
  };

  let mut entry = SentinelEntry {
    name: None,
    ip: None,
    port: None,
    flags: String::new(),
    role_reported: None,
    num_other_sentinels: 0,
  };
  let mut iter = items.into_iter();
  while let (Some(field), Some(val)) = (iter.next(), iter.next()) {
    let field = field.as_bytes().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
    match field.as_str() {
      "name" => entry.name = val.as_bytes().map(|b| String::from_utf8_lossy(b).into_owned()),
      "ip" => entry.ip = val.as_bytes().map(|b| String::from_utf8_lossy(b).into_owned()),
      "port" => entry.port = val.as_i64().map(|p| p as u16),
      "flags" => entry.flags = val.as_bytes().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default(),
      "role-reported" => entry.role_reported = val.as_bytes().map(|b| String::from_utf8_lossy(b).into_owned()),
      "num-other-sentinels" => entry.num_other_sentinels = val.as_i64().unwrap_or(0) as u32,
      _ => {},
    }
  }
  Some(entry)
}

fn is_down(flags: &str) -> bool {
  flags.split(',').any(|f| f == "s_down" || f == "o_down")
}

fn is_disconnected(flags: &str) -> bool {
  flags.split(',').any(|f| f == "disconnected")
}

pub struct SentinelRouter {
  config:          SentinelConfig,
  conn_cfg:        ConnectionConfig,
  server_config:   Config,
  pool_size:       usize,
  acquire_timeout: Duration,
  sentinels:       Mutex<Vec<Server>>,
  current_pool:    Mutex<Option<Pool>>,
  replica_cursor:  AtomicUsize,
}

impl SentinelRouter {
  pub fn new(config: SentinelConfig, server_config: Config, conn_cfg: ConnectionConfig, pool_size: usize, acquire_timeout: Duration) -> Self {
    let sentinels = config.sentinels.clone();
    SentinelRouter {
      config,
      conn_cfg,
      server_config,
      pool_size,
      acquire_timeout,
      sentinels: Mutex::new(sentinels),
      current_pool: Mutex::new(None),
      replica_cursor: AtomicUsize::new(0),
    }
  }

  fn sentinel_list(&self) -> Vec<Server> {
    self.sentinels.lock().clone()
  }

  fn promote(&self, winner: &Server) {
    let mut list = self.sentinels.lock();
    if let Some(pos) = list.iter().position(|s| s == winner) {
      let server = list.remove(pos);
      list.insert(0, server);
    }
  }

  async fn open_sentinel_connection(&self, server: &Server) -> Result<Connection, Error> {
    let mut config = Config::default();
    #[cfg(feature = "sentinel-auth")]
    {
      config.username = self.config.username.clone();
      config.password = self.config.password.clone();
    }
    Connection::connect(server, &config, &self.conn_cfg).await
  }

  /// Discovery algorithm for the master (spec §4.5.2, steps 1-3).
  async fn discover_master(&self) -> Result<Server, Error> {
    let mut last_err = None;
    for sentinel in self.sentinel_list() {
      let attempt = async {
        let mut connection = self.open_sentinel_connection(&sentinel).await?;
        let reply = connection.roundtrip(&cmd1("SENTINEL", "MASTERS")).await?;
        let entries = reply.into_array().unwrap_or_default();

        let winner = entries
          .iter()
          .filter_map(parse_entry)
          .find(|entry| entry.name.as_deref() == Some(self.config.service_name.as_str()));

        let entry = winner.ok_or_else(|| Error::new(ErrorKind::Discovery, "service not found in SENTINEL MASTERS"))?;
        if is_down(&entry.flags) {
          return Err(Error::new(ErrorKind::Discovery, "master reported down"));
        }
        if entry.role_reported.as_deref() != Some("master") {
          return Err(Error::new(ErrorKind::Discovery, "sentinel disagrees this node is master"));
        }
        if entry.num_other_sentinels < self.config.min_other_sentinels {
          return Err(Error::new(ErrorKind::Discovery, "not enough other sentinels have confirmed"));
        }
        let host = entry.ip.ok_or_else(|| Error::new(ErrorKind::Discovery, "missing ip in SENTINEL MASTERS reply"))?;
        let port = entry.port.ok_or_else(|| Error::new(ErrorKind::Discovery, "missing port in SENTINEL MASTERS reply"))?;

        // Refresh the sentinel list via this same sentinel before returning.
        if let Ok(reply) = connection.roundtrip(&cmd2("SENTINEL", "SENTINELS", self.config.service_name.as_str())).await {
          if let Some(peers) = reply.into_array() {
            let mut refreshed: Vec<Server> = peers
              .iter()
              .filter_map(parse_entry)
              .filter_map(|e| Some(Server::new(e.ip?, e.port?)))
              .collect();
            refreshed.push(sentinel.clone());
            *self.sentinels.lock() = refreshed;
          }
        }

        Ok::<Server, Error>(Server::new(host, port))
      }
      .await;

      match attempt {
        Ok(server) => {
          self.promote(&sentinel);
          return Ok(server);
        },
        Err(err) => last_err = Some(err),
      }
    }
    Err(last_err.unwrap_or_else(|| Error::new(ErrorKind::Discovery, "no sentinel answered")))
  }

  /// Discovery for a replica (spec §4.5.2): round-robin over the healthy set.
  async fn discover_replica(&self) -> Result<Server, Error> {
    let mut last_err = None;
    for sentinel in self.sentinel_list() {
      let attempt = async {
        let mut connection = self.open_sentinel_connection(&sentinel).await?;
        let reply = connection.roundtrip(&cmd2("SENTINEL", "REPLICAS", self.config.service_name.as_str())).await?;
        let entries: Vec<SentinelEntry> = reply.into_array().unwrap_or_default().iter().filter_map(parse_entry).collect();
        let healthy: Vec<Server> = entries
          .into_iter()
          .filter(|e| !is_down(&e.flags) && !is_disconnected(&e.flags))
          .filter_map(|e| Some(Server::new(e.ip?, e.port?)))
          .collect();
        if healthy.is_empty() {
          return Err(Error::new(ErrorKind::Discovery, "no healthy replicas reported"));
        }
        let idx = self.replica_cursor.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Ok::<Server, Error>(healthy[idx].clone())
      }
      .await;

      match attempt {
        Ok(server) => {
          self.promote(&sentinel);
          return Ok(server);
        },
        Err(err) => last_err = Some(err),
      }
    }
    Err(last_err.unwrap_or_else(|| Error::new(ErrorKind::Discovery, "no sentinel answered")))
  }

  async fn discover(&self) -> Result<Server, Error> {
    match self.config.role {
      SentinelRole::Master => self.discover_master().await,
      SentinelRole::Replica => self.discover_replica().await,
    }
  }

  /// Verify the discovered endpoint's role with `ROLE` (spec §4.5.2). On
  /// mismatch, sleep 250ms and surface a `Failover` error so the caller's
  /// retry re-enters discovery.
  async fn verify_role(&self, connection: &mut Connection) -> Result<(), Error> {
    let reply = connection.roundtrip(&Command::new("ROLE")).await?;
    let items = reply.into_array().unwrap_or_default();
    let reported = items.first().and_then(|v| v.as_bytes()).map(|b| String::from_utf8_lossy(b).into_owned());
    let expected = match self.config.role {
      SentinelRole::Master => "master",
      SentinelRole::Replica => "slave",
    };
    if reported.as_deref() != Some(expected) {
      tokio::time::sleep(Duration::from_millis(250)).await;
      return Err(Error::new(ErrorKind::Failover, "discovered endpoint disagrees with the requested role"));
    }
    Ok(())
  }

  async fn refresh_pool(&self) -> Result<Pool, Error> {
    let server = self.discover().await?;
    let pool = Pool::new(server, self.server_config.clone(), self.conn_cfg.clone(), self.pool_size);
    {
      let mut checkout = pool.acquire(self.acquire_timeout).await?;
      self.verify_role(&mut checkout).await?;
    }
    *self.current_pool.lock() = Some(pool.clone());
    Ok(pool)
  }

  async fn current_or_refresh(&self) -> Result<Pool, Error> {
    if let Some(pool) = self.current_pool.lock().clone() {
      return Ok(pool);
    }
    self.refresh_pool().await
  }

  /// Whether a server error indicates the endpoint was demoted (spec
  /// §4.5.2 "Failover handling at command level").
  fn is_demotion(err: &Error) -> bool {
    *err.kind() == ErrorKind::ReadOnly
  }
}

#[async_trait]
impl Route for SentinelRouter {
  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let pool = self.current_or_refresh().await?;
    let timeout = self.acquire_timeout;
    let cmd = command.clone();
    let result = pool.with(timeout, move |connection| async move { connection.roundtrip(&cmd).await }).await;

    match result {
      Err(err) if Self::is_demotion(&err) => {
        *self.current_pool.lock() = None;
        let pool = self.refresh_pool().await?;
        pool.with(timeout, move |connection| async move { connection.roundtrip(&command).await }).await
      },
      other => other,
    }
  }

  async fn checkout(&self, _command: &Command) -> Result<Checkout, Error> {
    let pool = self.current_or_refresh().await?;
    pool.acquire(self.acquire_timeout).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry_value(fields: &[(&str, &str)]) -> Value {
    Value::Array(Some(
      fields
        .iter()
        .flat_map(|(k, v)| [Value::BlobString((*k).into()), Value::BlobString((*v).into())])
        .collect(),
    ))
  }

  #[test]
  fn parses_masters_entry_fields() {
    let value = entry_value(&[
      ("name", "mymaster"),
      ("ip", "127.0.0.1"),
      ("port", "6379"),
      ("flags", "master"),
      ("role-reported", "master"),
      ("num-other-sentinels", "2"),
    ]);
    let entry = parse_entry(&value).unwrap();
    assert_eq!(entry.name.as_deref(), Some("mymaster"));
    assert_eq!(entry.ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(entry.port, Some(6379));
    assert_eq!(entry.role_reported.as_deref(), Some("master"));
    assert_eq!(entry.num_other_sentinels, 2);
  }

  #[test]
  fn is_down_detects_s_down_and_o_down_flags() {
    assert!(is_down("s_down,master"));
    assert!(is_down("o_down"));
    assert!(!is_down("master"));
  }

  #[test]
  fn is_disconnected_detects_the_flag() {
    assert!(is_disconnected("slave,disconnected"));
    assert!(!is_disconnected("slave"));
  }

  #[test]
  fn promote_moves_the_successful_sentinel_to_the_front() {
    let router = SentinelRouter::new(
      SentinelConfig {
        sentinels: vec![Server::new("a", 1), Server::new("b", 2), Server::new("c", 3)],
        service_name: "mymaster".into(),
        role: SentinelRole::Master,
        min_other_sentinels: 0,
        #[cfg(feature = "sentinel-auth")]
        username: None,
        #[cfg(feature = "sentinel-auth")]
        password: None,
      },
      Config::default(),
      ConnectionConfig::default(),
      4,
      Duration::from_secs(1),
    );
    router.promote(&Server::new("c", 3));
    assert_eq!(router.sentinel_list()[0], Server::new("c", 3));
  }
}
