use redis_core::{clients::Client, error::Error, interfaces::HashesInterface};
use std::collections::HashMap;

pub async fn should_hset_and_hget_a_field(client: Client) -> Result<(), Error> {
  let key = "integration:hashes:hset_hget";
  client.hset(key, "field", "value").await?;
  let value: String = client.hget(key, "field").await?;
  assert_eq!(value, "value");
  Ok(())
}

pub async fn should_hgetall_every_field(client: Client) -> Result<(), Error> {
  let key = "integration:hashes:hgetall";
  client.hset(key, "a", "1").await?;
  client.hset(key, "b", "2").await?;
  let all: HashMap<String, String> = client.hgetall(key).await?;
  assert_eq!(all.get("a").map(String::as_str), Some("1"));
  assert_eq!(all.get("b").map(String::as_str), Some("2"));
  Ok(())
}
