//! L4: topology-aware routing. Each submodule owns one topology's view of
//! "which server does this command go to" and hands the actual bytes off to
//! an L3 [`crate::pool::Pool`]; none of them touch the wire directly.

pub mod active_active;
pub mod centralized;
pub mod cluster;
pub mod discovery;
#[cfg(feature = "dns")]
pub mod dns;
pub mod sentinel;

use crate::{error::Error, protocol::command::Command, types::Value};
use async_trait::async_trait;

/// Common surface every topology router exposes to the client façade. A
/// single command in, a single reply out — pipelines and transactions stay
/// pinned to one connection (spec §4.3) and so are negotiated by the caller
/// against a [`crate::pool::Checkout`] directly rather than through this
/// trait.
#[async_trait]
pub trait Route: Send + Sync {
  /// Route and execute one command, transparently handling whatever
  /// topology-specific redirection or failover this router is responsible
  /// for (spec §4.5).
  async fn dispatch(&self, command: Command) -> Result<Value, Error>;

  /// Acquire a connection this router considers eligible for `command`
  /// (without executing anything), for callers that need to run a
  /// pipeline or transaction against one fixed connection.
  async fn checkout(&self, command: &Command) -> Result<crate::pool::Checkout, Error>;
}
