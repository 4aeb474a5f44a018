use redis_core::{
  clients::Client,
  error::Error,
  interfaces::{KeysInterface, ListsInterface},
};

pub async fn should_lpush_and_lrange_a_list(client: Client) -> Result<(), Error> {
  let key = "integration:lists:lpush_lrange";
  client.del(key).await?;
  client.lpush(key, "b").await?;
  client.lpush(key, "a").await?;
  let values: Vec<String> = client.lrange(key, 0, -1).await?;
  assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
  Ok(())
}

pub async fn should_report_the_new_length_after_lpush(client: Client) -> Result<(), Error> {
  let key = "integration:lists:length";
  client.del(key).await?;
  assert_eq!(client.lpush(key, "one").await?, 1);
  assert_eq!(client.lpush(key, "two").await?, 2);
  Ok(())
}
