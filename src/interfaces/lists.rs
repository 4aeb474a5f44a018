//! LPUSH/LRANGE (`i-lists`).

use crate::{error::Error, interfaces::ClientLike, protocol::{cmd2, command::Command, IntoArgument}, types::{FromValue, Key}};
use async_trait::async_trait;

#[async_trait]
pub trait ListsInterface: ClientLike {
  async fn lpush<K, V>(&self, key: K, value: V) -> Result<i64, Error>
  where
    K: Into<Key> + Send,
    V: IntoArgument + Send,
  {
    let key: Key = key.into();
    i64::from_value(self.send(cmd2("LPUSH", key, value).hash_first_key()).await?)
  }

  async fn lrange<R, K>(&self, key: K, start: i64, stop: i64) -> Result<Vec<R>, Error>
  where
    R: FromValue,
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    let command = Command::new("LRANGE").arg(key).arg(start).arg(stop).read().hash_first_key();
    Vec::from_value(self.send(command).await?)
  }
}

impl<T: ClientLike> ListsInterface for T {}
