use redis_core::{clients::Client, error::Error, interfaces::ServerInterface};

pub async fn should_ping_once_connected(client: Client) -> Result<(), Error> {
  client.ping().await
}

pub async fn should_record_a_pool_checkout_per_round_trip(client: Client) -> Result<(), Error> {
  let before = client.metrics().pool_checkouts;
  client.ping().await?;
  let after = client.metrics().pool_checkouts;
  assert!(after > before);
  Ok(())
}
