//! Small protocol-level types shared by the codec, connection, and cluster
//! router.

use std::fmt;

/// The RESP protocol version negotiated with `HELLO`. This client only
/// speaks RESP3 on the wire (spec §1 Non-goals); `Resp2` exists solely so a
/// `HELLO 3` rejection can be reported precisely before the client gives up
/// (spec §6: "no silent downgrade").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RespVersion {
  Resp2,
  #[default]
  Resp3,
}

impl fmt::Display for RespVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RespVersion::Resp2 => write!(f, "RESP2"),
      RespVersion::Resp3 => write!(f, "RESP3"),
    }
  }
}

/// How a command's cluster slot is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterHash {
  /// Hash the first key argument (the common case).
  FirstKey,
  /// Pin to an explicit slot (used by `WATCH`/transactions that already
  /// validated every key maps to the same slot).
  Slot(u16),
  /// The command has no key and may be sent to any node (e.g. `PING`).
  Random,
}

/// Where a Cluster-aware router may send a command, independent of slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterRouting {
  Master,
  Replica,
  /// A specific node addressed directly (`with_cluster_node`, ASK targets).
  Exact,
}
