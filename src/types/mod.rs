//! Public data types: the decoded RESP3 [`Value`], configuration
//! aggregates, and the small set of supporting types the client surface
//! needs (`InfoKind`, `ConnectHandle`, ...).

pub mod config;
mod value;

pub use value::{FromValue, Key, VerbatimFormat, Value};
pub use crate::protocol::hashers::RespVersion;

use tokio::task::JoinHandle;

use crate::error::Error;

/// The join handle returned by `Client::connect()`, resolving once the
/// client's background I/O task exits (on `quit()` or an unrecoverable
/// error with `fail_fast` set).
pub type ConnectHandle = JoinHandle<Result<(), Error>>;

/// Selects the section returned by `INFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
  Default,
  All,
  Everything,
  Server,
  Clients,
  Memory,
  Persistence,
  Stats,
  Replication,
  Cpu,
  Cluster,
  Keyspace,
}

impl InfoKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      InfoKind::Default => "default",
      InfoKind::All => "all",
      InfoKind::Everything => "everything",
      InfoKind::Server => "server",
      InfoKind::Clients => "clients",
      InfoKind::Memory => "memory",
      InfoKind::Persistence => "persistence",
      InfoKind::Stats => "stats",
      InfoKind::Replication => "replication",
      InfoKind::Cpu => "cpu",
      InfoKind::Cluster => "cluster",
      InfoKind::Keyspace => "keyspace",
    }
  }
}

/// `CLIENT UNPAUSE`/`CLIENT UNBLOCK` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientUnblockFlag {
  Timeout,
  Error,
}

/// A point-in-time snapshot of `MEMORY STATS`. Left intentionally sparse —
/// memory introspection is a peripheral command wrapper, not a core
/// concern — but kept because the tracking cache's eviction metrics are
/// reported through the same instrumentation sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
  pub peak_allocated:  u64,
  pub total_allocated: u64,
  pub keys_count:      u64,
}

/// One entry from `SLOWLOG GET`.
#[derive(Debug, Clone)]
pub struct SlowlogEntry {
  pub id:        i64,
  pub timestamp: i64,
  pub duration_micros: i64,
  pub args:      Vec<bytes::Bytes>,
  pub client_addr: Option<String>,
  pub client_name: Option<String>,
}
