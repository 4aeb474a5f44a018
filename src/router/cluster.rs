//! Cluster routing (spec §4.5.3): a 16384-slot map, hash-tag-aware key
//! hashing, and the `MOVED`/`ASK`/`TRYAGAIN`/`CLUSTERDOWN`/`CROSSSLOT`
//! redirection state machine.

use crate::{
  error::{Error, ErrorKind},
  pool::{Checkout, Pool},
  protocol::{cmd0, command::Command, hashers::key_slot, types::ClusterHash},
  router::Route,
  types::{
    config::{ClusterDiscoveryPolicy, Config, ConnectionConfig, ReadFrom, ReplicaConfig, Server},
    Value,
  },
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::{collections::HashMap, sync::Arc, time::Duration};

/// One contiguous slot range and the master/replica set that owns it,
/// exactly as reported by `CLUSTER SLOTS`.
#[derive(Debug, Clone)]
pub struct SlotRange {
  pub start:    u16,
  pub end:      u16,
  pub master:   Server,
  pub replicas: Vec<Server>,
}

#[derive(Debug, Clone, Default)]
pub struct SlotMap {
  ranges: Vec<SlotRange>,
}

impl SlotMap {
  fn from_ranges(mut ranges: Vec<SlotRange>) -> Self {
    ranges.sort_by_key(|r| r.start);
    SlotMap { ranges }
  }

  /// Binary search for the range owning `slot` (spec §4.5.3, "16384 fixed
  /// hash slots").
  pub fn owner(&self, slot: u16) -> Option<&SlotRange> {
    let idx = self.ranges.partition_point(|r| r.end < slot);
    self.ranges.get(idx).filter(|r| r.start <= slot && slot <= r.end)
  }

  pub fn any_master(&self) -> Option<Server> {
    self.ranges.first().map(|r| r.master.clone())
  }

  pub fn is_empty(&self) -> bool {
    self.ranges.is_empty()
  }

  pub fn masters(&self) -> impl Iterator<Item = &Server> {
    self.ranges.iter().map(|r| &r.master)
  }
}

/// Parse a `MOVED`/`ASK` error detail string (`"<slot> <host>:<port>"`) into
/// the redirection target.
fn parse_redirection_target(details: &str) -> Option<Server> {
  let mut parts = details.split_whitespace();
  let _slot = parts.next()?;
  let addr = parts.next()?;
  let (host, port) = addr.rsplit_once(':')?;
  Some(Server::new(host, port.parse().ok()?))
}

/// Parse one `CLUSTER SLOTS` entry: `[start, end, [ip, port, id, ...], [replica ip, port, id, ...], ...]`.
fn parse_slot_entry(value: &Value) -> Option<SlotRange> {
  let items = match value {
    Value::Array(Some(items)) => items,
    _ => return None,
  };
  if items.len() < 3 {
    return None;
  }
  let start = items[0].as_i64()? as u16;
  let end = items[1].as_i64()? as u16;
  let master = parse_node(&items[2])?;
  let replicas = items[3 ..].iter().filter_map(parse_node).collect();
  Some(SlotRange { start, end, master, replicas })
}

fn parse_node(value: &Value) -> Option<Server> {
  let items = match value {
    Value::Array(Some(items)) => items,
    _ => return None,
  };
  let host = match items.first()? {
    Value::BlobString(b) => String::from_utf8_lossy(b).into_owned(),
    Value::SimpleString(s) => s.clone(),
    _ => return None,
  };
  let port = items.get(1)?.as_i64()? as u16;
  Some(Server::new(host, port))
}

pub struct ClusterRouter {
  pools:            Mutex<HashMap<Server, Pool>>,
  slots:            arc_swap::ArcSwap<SlotMap>,
  seeds:            Vec<Server>,
  config:           Config,
  conn_cfg:         ConnectionConfig,
  discovery_policy: ClusterDiscoveryPolicy,
  replica_config:   ReplicaConfig,
  pool_size:        usize,
  acquire_timeout:  Duration,
}

impl ClusterRouter {
  pub async fn connect(
    seeds: Vec<Server>,
    config: Config,
    conn_cfg: ConnectionConfig,
    discovery_policy: ClusterDiscoveryPolicy,
    replica_config: ReplicaConfig,
    pool_size: usize,
    acquire_timeout: Duration,
  ) -> Result<Self, Error> {
    let router = ClusterRouter {
      pools: Mutex::new(HashMap::new()),
      slots: arc_swap::ArcSwap::from_pointee(SlotMap::default()),
      seeds,
      config,
      conn_cfg,
      discovery_policy,
      replica_config,
      pool_size,
      acquire_timeout,
    };
    router.refresh_slots().await?;
    Ok(router)
  }

  fn ensure_pool(&self, server: &Server) -> Pool {
    let server = self.translate(server.clone());
    let mut pools = self.pools.lock();
    pools
      .entry(server.clone())
      .or_insert_with(|| Pool::new(server, self.config.clone(), self.conn_cfg.clone(), self.pool_size))
      .clone()
  }

  /// Apply `ClusterDiscoveryPolicy::host_translation` (spec §4.5.3: Redis
  /// often announces an address unreachable from outside its own network,
  /// e.g. a Docker-internal hostname).
  fn translate(&self, server: Server) -> Server {
    self
      .discovery_policy
      .host_translation
      .as_ref()
      .and_then(|map| map.get(&server.to_string()))
      .cloned()
      .unwrap_or(server)
  }

  /// Re-fetch `CLUSTER SLOTS` from the first seed (or previously discovered
  /// master) that answers, rebuilding the slot map from scratch.
  pub async fn refresh_slots(&self) -> Result<(), Error> {
    let mut candidates: Vec<Server> = self.slots.load().masters().cloned().collect();
    candidates.extend(self.seeds.iter().cloned());

    let mut last_err = None;
    for server in candidates {
      let pool = self.ensure_pool(&server);
      match pool.with(self.conn_cfg.connect_timeout, |connection| async move { connection.roundtrip(&cmd0("CLUSTER").arg("SLOTS")).await }).await {
        Ok(reply) => {
          let items = reply.into_array().unwrap_or_default();
          let ranges: Vec<SlotRange> = items.iter().filter_map(parse_slot_entry).collect();
          if ranges.is_empty() {
            continue;
          }
          self.slots.store(Arc::new(SlotMap::from_ranges(ranges)));
          return Ok(());
        },
        Err(err) => last_err = Some(err),
      }
    }

    Err(last_err.unwrap_or_else(|| Error::new(ErrorKind::Discovery, "no cluster seed answered CLUSTER SLOTS")))
  }

  fn pick_server(&self, entry: &SlotRange, is_read: bool) -> Server {
    if !is_read || entry.replicas.is_empty() {
      return entry.master.clone();
    }
    match self.replica_config.read_from {
      ReadFrom::Master => entry.master.clone(),
      ReadFrom::Replica => {
        let idx = rand::thread_rng().gen_range(0 .. entry.replicas.len());
        entry.replicas[idx].clone()
      },
      ReadFrom::ReplicaPreferred => {
        let idx = rand::thread_rng().gen_range(0 .. entry.replicas.len());
        entry.replicas[idx].clone()
      },
    }
  }

  fn target_for(&self, command: &Command) -> Result<Server, Error> {
    let slots = self.slots.load();
    if slots.is_empty() {
      return Err(Error::new(ErrorKind::ClusterDown, "slot map has not been populated"));
    }

    let slot = match command.hash {
      ClusterHash::Slot(slot) => slot,
      ClusterHash::FirstKey => match command.cluster_key() {
        Some(key) => key_slot(key),
        None => return Err(Error::new(ErrorKind::CrossSlot, "command requires a key for cluster routing")),
      },
      ClusterHash::Random => return slots.any_master().ok_or_else(|| Error::new(ErrorKind::ClusterDown, "slot map is empty")),
    };

    let entry = slots.owner(slot).ok_or_else(|| Error::new(ErrorKind::ClusterDown, "no node owns this slot"))?;
    Ok(self.pick_server(entry, command.is_read))
  }
}

#[async_trait]
impl Route for ClusterRouter {
  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let max_redirections = self.discovery_policy.max_redirections.max(1);
    let max_transport_retries = self.discovery_policy.retry_count.max(1);
    let mut attempt = 0u32;
    let mut transport_attempt = 0u32;
    let mut asking_target: Option<Server> = None;

    loop {
      let (server, needs_asking) = match asking_target.take() {
        Some(server) => (server, true),
        None => (self.target_for(&command)?, false),
      };

      let pool = self.ensure_pool(&server);
      let cmd = command.clone();
      let result = pool
        .with(self.acquire_timeout, move |connection| async move {
          if needs_asking {
            connection.roundtrip(&cmd0("ASKING")).await?;
          }
          connection.roundtrip(&cmd).await
        })
        .await;

      match result {
        Ok(value) => return Ok(value),
        Err(err) if attempt < max_redirections => match err.kind() {
          ErrorKind::Moved => {
            attempt += 1;
            self.refresh_slots().await.ok();
            continue;
          },
          ErrorKind::Ask => {
            attempt += 1;
            match parse_redirection_target(err.details()) {
              Some(target) => {
                asking_target = Some(target);
                continue;
              },
              None => return Err(err),
            }
          },
          ErrorKind::TryAgain => {
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
          },
          ErrorKind::Io | ErrorKind::Timeout if transport_attempt < max_transport_retries => {
            transport_attempt += 1;
            let backoff = Duration::from_millis(100 * 2u64.pow(transport_attempt - 1));
            tokio::time::sleep(backoff).await;
            self.refresh_slots().await.ok();
            continue;
          },
          _ => return Err(err),
        },
        Err(err) => return Err(err),
      }
    }
  }

  async fn checkout(&self, command: &Command) -> Result<Checkout, Error> {
    let server = self.target_for(command)?;
    self.ensure_pool(&server).acquire(self.acquire_timeout).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn range(start: u16, end: u16, port: u16) -> SlotRange {
    SlotRange {
      start,
      end,
      master: Server::new("127.0.0.1", port),
      replicas: Vec::new(),
    }
  }

  #[test]
  fn owner_finds_the_containing_range() {
    let map = SlotMap::from_ranges(vec![range(0, 5460, 7000), range(5461, 10922, 7001), range(10923, 16383, 7002)]);
    assert_eq!(map.owner(0).unwrap().master.port, 7000);
    assert_eq!(map.owner(5461).unwrap().master.port, 7001);
    assert_eq!(map.owner(16383).unwrap().master.port, 7002);
  }

  #[test]
  fn owner_returns_none_for_an_unassigned_slot() {
    let map = SlotMap::from_ranges(vec![range(0, 100, 7000)]);
    assert!(map.owner(101).is_none());
  }

  #[test]
  fn parses_moved_redirection_target() {
    let target = parse_redirection_target("3999 127.0.0.1:7001").unwrap();
    assert_eq!(target.host, "127.0.0.1");
    assert_eq!(target.port, 7001);
  }

  #[test]
  fn parses_cluster_slots_reply_shape() {
    let entry = Value::Array(Some(vec![
      Value::Integer(0),
      Value::Integer(16383),
      Value::Array(Some(vec![Value::BlobString("127.0.0.1".into()), Value::Integer(7000)])),
    ]));
    let parsed = parse_slot_entry(&entry).unwrap();
    assert_eq!(parsed.start, 0);
    assert_eq!(parsed.end, 16383);
    assert_eq!(parsed.master, Server::new("127.0.0.1", 7000));
  }
}
