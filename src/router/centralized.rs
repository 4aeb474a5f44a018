//! Standalone routing (spec §4.5.1): one server, one pool, no redirection
//! logic. Every other router ultimately bottoms out in something shaped
//! like this for each node it talks to.

use crate::{
  error::Error,
  pool::{Checkout, Pool},
  protocol::command::Command,
  router::Route,
  types::{config::Server, Value},
};
use async_trait::async_trait;
use std::time::Duration;

pub struct CentralizedRouter {
  pool: Pool,
  acquire_timeout: Duration,
}

impl CentralizedRouter {
  pub fn new(pool: Pool, acquire_timeout: Duration) -> Self {
    CentralizedRouter { pool, acquire_timeout }
  }

  pub fn server(&self) -> &Server {
    self.pool.server()
  }

  pub fn pool(&self) -> &Pool {
    &self.pool
  }
}

#[async_trait]
impl Route for CentralizedRouter {
  async fn dispatch(&self, command: Command) -> Result<Value, Error> {
    let timeout = self.acquire_timeout;
    self.pool.with(timeout, move |connection| async move { connection.roundtrip(&command).await }).await
  }

  async fn checkout(&self, _command: &Command) -> Result<Checkout, Error> {
    self.pool.acquire(self.acquire_timeout).await
  }
}
