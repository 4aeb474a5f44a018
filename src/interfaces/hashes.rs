//! HGET/HSET/HGETALL (`i-hashes`).

use crate::{
  error::Error,
  interfaces::ClientLike,
  protocol::{cmd1, cmd2, cmd3, IntoArgument},
  types::{FromValue, Key},
};
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait HashesInterface: ClientLike {
  async fn hget<R, K, F>(&self, key: K, field: F) -> Result<R, Error>
  where
    R: FromValue,
    K: Into<Key> + Send,
    F: IntoArgument + Send,
  {
    let key: Key = key.into();
    R::from_value(self.send(cmd2("HGET", key, field).read().hash_first_key()).await?)
  }

  async fn hset<K, F, V>(&self, key: K, field: F, value: V) -> Result<i64, Error>
  where
    K: Into<Key> + Send,
    F: IntoArgument + Send,
    V: IntoArgument + Send,
  {
    let key: Key = key.into();
    i64::from_value(self.send(cmd3("HSET", key, field, value).hash_first_key()).await?)
  }

  async fn hgetall<R, K>(&self, key: K) -> Result<HashMap<String, R>, Error>
  where
    R: FromValue + Send,
    K: Into<Key> + Send,
  {
    let key: Key = key.into();
    HashMap::from_value(self.send(cmd1("HGETALL", key).read().hash_first_key()).await?)
  }
}

impl<T: ClientLike> HashesInterface for T {}
