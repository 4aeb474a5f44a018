//! A round-robin façade over several independently-connected [`Client`]s
//! to the same logical endpoint (spec §4.4), distinct from the L3
//! [`crate::pool::Pool`] each client draws its own connections from.

use crate::{
  clients::client::Client,
  error::{Error, ErrorKind},
  protocol::cmd0,
  types::ConnectHandle,
};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

struct Inner {
  clients: Vec<Client>,
  cursor:  AtomicUsize,
}

/// Cheap to clone — every clone shares the same client set and round-robin
/// cursor.
#[derive(Clone)]
pub struct Pool {
  inner: Arc<Inner>,
}

impl Pool {
  pub fn new(clients: Vec<Client>) -> Self {
    Pool {
      inner: Arc::new(Inner {
        clients,
        cursor: AtomicUsize::new(0),
      }),
    }
  }

  pub fn clients(&self) -> &[Client] {
    &self.inner.clients
  }

  /// Pick the next client in round-robin order.
  pub fn acquire(&self) -> &Client {
    let idx = self.inner.cursor.fetch_add(1, Ordering::Relaxed) % self.inner.clients.len();
    &self.inner.clients[idx]
  }

  /// Connect every client in the pool in the background, returning a
  /// handle that resolves once they all either finish or one fails.
  pub fn connect(&self) -> ConnectHandle {
    let handles: Vec<ConnectHandle> = self.inner.clients.iter().map(Client::connect).collect();
    tokio::spawn(async move {
      for handle in handles {
        handle.await.map_err(|_| Error::new(ErrorKind::Canceled, "a pool client's connect task panicked"))??;
      }
      Ok(())
    })
  }

  pub async fn wait_for_connect(&self) -> Result<(), Error> {
    for client in &self.inner.clients {
      client.wait_for_connect().await?;
    }
    Ok(())
  }

  /// Connect every client and wait for all of them to finish (teacher
  /// pattern: `pool.init().await?` combines `connect()` + `wait_for_connect()`).
  pub async fn init(&self) -> Result<ConnectHandle, Error> {
    let handle = self.connect();
    self.wait_for_connect().await?;
    Ok(handle)
  }

  pub async fn ping(&self) -> Result<(), Error> {
    self.acquire().call::<()>(cmd0("PING")).await
  }

  pub async fn quit(&self) -> Result<(), Error> {
    for client in &self.inner.clients {
      client.quit().await?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::config::{Config, ConnectionConfig, PerformanceConfig};

  fn pool(size: usize) -> Pool {
    let clients = (0 .. size)
      .map(|_| Client::new(Config::default(), ConnectionConfig::default(), PerformanceConfig::default(), None, None, 4, crate::events::EventSink::new(16)))
      .collect();
    Pool::new(clients)
  }

  #[test]
  fn acquire_cycles_through_every_client_before_repeating() {
    let pool = pool(3);
    let picked: Vec<*const ()> = (0 .. 6).map(|_| pool.acquire() as *const Client as *const ()).collect();
    assert_eq!(picked[0], picked[3]);
    assert_eq!(picked[1], picked[4]);
    assert_eq!(picked[2], picked[5]);
  }

  #[test]
  fn clients_reports_the_configured_count() {
    assert_eq!(pool(5).clients().len(), 5);
  }
}
