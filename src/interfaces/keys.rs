//! GET/SET/DEL/INCR/MGET/MSET/EXISTS/EXPIRE/TTL (`i-keys`).

use crate::{
  interfaces::ClientLike,
  protocol::{cmd1, cmd2, command::Command, IntoArgument},
  types::{FromValue, Key},
  error::Error,
};
use async_trait::async_trait;

#[async_trait]
pub trait KeysInterface: ClientLike {
  async fn get<R, K>(&self, key: K) -> Result<R, Error>
  where
    R: FromValue,
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    R::from_value(self.send(cmd1("GET", key).read().hash_first_key()).await?)
  }

  async fn set<K, V>(&self, key: K, value: V) -> Result<(), Error>
  where
    K: Into<Key> + Send,
    V: IntoArgument + Send,
  {
    let key: Key = key.into();
    <() as FromValue>::from_value(self.send(cmd2("SET", key, value).hash_first_key()).await?)
  }

  async fn del<K>(&self, key: K) -> Result<i64, Error>
  where
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    i64::from_value(self.send(cmd1("DEL", key).hash_first_key()).await?)
  }

  async fn incr<K>(&self, key: K) -> Result<i64, Error>
  where
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    i64::from_value(self.send(cmd1("INCR", key).hash_first_key()).await?)
  }

  async fn mget<R, K>(&self, keys: Vec<K>) -> Result<Vec<R>, Error>
  where
    R: FromValue,
    K: Into<Key> + Send,
  {
    let command = Command::new("MGET").args(keys.into_iter().map(|k| -> Key { k.into() })).read();
    Vec::from_value(self.send(command).await?)
  }

  async fn mset<K, V>(&self, pairs: Vec<(K, V)>) -> Result<(), Error>
  where
    K: Into<Key> + Send,
    V: IntoArgument + Send,
  {
    let mut command = Command::new("MSET");
    for (key, value) in pairs {
      let key: Key = key.into();
      command = command.arg(key).arg(value);
    }
    <() as FromValue>::from_value(self.send(command).await?)
  }

  async fn exists<K>(&self, key: K) -> Result<bool, Error>
  where
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    let count = i64::from_value(self.send(cmd1("EXISTS", key).read().hash_first_key()).await?)?;
    Ok(count > 0)
  }

  async fn expire<K>(&self, key: K, seconds: i64) -> Result<bool, Error>
  where
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    bool::from_value(self.send(cmd2("EXPIRE", key, seconds).hash_first_key()).await?)
  }

  async fn ttl<K>(&self, key: K) -> Result<i64, Error>
  where
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    i64::from_value(self.send(cmd1("TTL", key).read().hash_first_key()).await?)
  }
}

impl<T: ClientLike> KeysInterface for T {}
