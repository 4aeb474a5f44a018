use redis_core::{clients::Client, error::Error, interfaces::ServerInterface};

pub async fn should_ping_the_server(client: Client) -> Result<(), Error> {
  client.ping().await
}

pub async fn should_echo_back_the_message(client: Client) -> Result<(), Error> {
  let message = client.echo("integration-echo").await?;
  assert_eq!(message, "integration-echo");
  Ok(())
}
