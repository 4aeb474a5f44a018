//! SUBSCRIBE/PUBLISH (`i-pubsub`).
//!
//! `subscribe` here only issues the subscription command; actually reading
//! the resulting messages means holding onto the same connection, which is
//! what [`crate::tracking::consumer::run_invalidation_consumer`] does via
//! [`crate::connection::Connection::subscribe_push`] against a pinned
//! checkout rather than through this trait's stateless dispatch path.

use crate::{error::Error, interfaces::ClientLike, protocol::{cmd1, cmd2, IntoArgument}, types::{FromValue, Key}};
use async_trait::async_trait;

#[async_trait]
pub trait PubsubInterface: ClientLike {
  async fn subscribe<K>(&self, channel: K) -> Result<(), Error>
  where
    K: Into<Key> + Send,
  {
    let channel: Key = channel.into();
    <() as FromValue>::from_value(self.send(cmd1("SUBSCRIBE", channel).no_retry()).await?)
  }

  async fn publish<K, V>(&self, channel: K, message: V) -> Result<i64, Error>
  where
    K: Into<Key> + Send,
    V: IntoArgument + Send,
  {
    let channel: Key = channel.into();
    i64::from_value(self.send(cmd2("PUBLISH", channel, message)).await?)
  }
}

impl<T: ClientLike> PubsubInterface for T {}
