//! Cluster-topology smoke tests (spec §4.5.3): the same `KeysInterface`
//! surface other topologies use, run against a `ServerConfig::Clustered`
//! client so a `MOVED` redirection on a cold slot map is exercised for
//! real rather than only in `ClusterRouter`'s unit tests.

use redis_core::{clients::Client, error::Error, interfaces::KeysInterface};

pub async fn should_set_and_get_across_the_cluster(client: Client) -> Result<(), Error> {
  let key = "integration:cluster:set_and_get";
  client.set(key, "bar").await?;
  let value: String = client.get(key).await?;
  assert_eq!(value, "bar");
  Ok(())
}

pub async fn should_route_same_hash_tag_keys_together(client: Client) -> Result<(), Error> {
  // Both keys share the `{cluster-tag}` hash tag, so they land on the same
  // slot regardless of how the rest of the key name differs (spec §4.5.3
  // "Hash tags").
  let a = "integration:cluster:{cluster-tag}:a";
  let b = "integration:cluster:{cluster-tag}:b";
  client.set(a, "1").await?;
  client.set(b, "2").await?;
  assert_eq!(client.get::<String, _>(a).await?, "1");
  assert_eq!(client.get::<String, _>(b).await?, "2");
  Ok(())
}
