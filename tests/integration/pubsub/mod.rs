use redis_core::{clients::Client, error::Error, interfaces::PubsubInterface};

pub async fn should_publish_with_no_subscribers(client: Client) -> Result<(), Error> {
  let receivers = client.publish("integration:pubsub:channel", "hello").await?;
  assert_eq!(receivers, 0);
  Ok(())
}

pub async fn should_subscribe_without_error(client: Client) -> Result<(), Error> {
  client.subscribe("integration:pubsub:subscribe").await?;
  Ok(())
}
