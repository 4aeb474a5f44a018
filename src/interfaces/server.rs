//! PING/ECHO (`i-server`).

use crate::{error::Error, interfaces::ClientLike, protocol::{cmd0, cmd1, IntoArgument}, types::FromValue};
use async_trait::async_trait;

#[async_trait]
pub trait ServerInterface: ClientLike {
  async fn ping(&self) -> Result<(), Error> {
    <() as FromValue>::from_value(self.send(cmd0("PING").read()).await?)
  }

  async fn echo<V>(&self, message: V) -> Result<String, Error>
  where
    V: IntoArgument + Send,
  {
    String::from_value(self.send(cmd1("ECHO", message).read()).await?)
  }
}

impl<T: ClientLike> ServerInterface for T {}
