use redis_core::{clients::Client, error::Error, interfaces::KeysInterface};

pub async fn should_set_and_get_a_value(client: Client) -> Result<(), Error> {
  let key = "integration:keys:set_and_get";
  client.set(key, "bar").await?;
  let value: String = client.get(key).await?;
  assert_eq!(value, "bar");
  Ok(())
}

pub async fn should_incr_a_missing_key_from_zero(client: Client) -> Result<(), Error> {
  let key = "integration:keys:incr";
  client.del(key).await?;
  assert_eq!(client.incr(key).await?, 1);
  assert_eq!(client.incr(key).await?, 2);
  Ok(())
}

pub async fn should_report_exists_correctly(client: Client) -> Result<(), Error> {
  let key = "integration:keys:exists";
  client.del(key).await?;
  assert!(!client.exists(key).await?);
  client.set(key, "1").await?;
  assert!(client.exists(key).await?);
  Ok(())
}

pub async fn should_expire_and_read_back_ttl(client: Client) -> Result<(), Error> {
  let key = "integration:keys:expire";
  client.set(key, "1").await?;
  assert!(client.expire(key, 100).await?);
  let ttl = client.ttl(key).await?;
  assert!(ttl > 0 && ttl <= 100);
  Ok(())
}

pub async fn should_mset_and_mget_several_keys(client: Client) -> Result<(), Error> {
  let pairs = vec![("integration:keys:mset:1", "a"), ("integration:keys:mset:2", "b")];
  client.mset(pairs).await?;
  let values: Vec<String> = client.mget(vec!["integration:keys:mset:1", "integration:keys:mset:2"]).await?;
  assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
  Ok(())
}
