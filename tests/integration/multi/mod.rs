use redis_core::{
  clients::Client,
  connection::{Connection, Transaction},
  error::Error,
  protocol::{cmd1, cmd2, command::Command},
  types::{config::{Config, ConnectionConfig}, FromValue, Value},
};

pub async fn should_commit_a_transaction(client: Client) -> Result<(), Error> {
  let key = "integration:multi:commit";
  let hint = cmd1("GET", key);

  client
    .with_pinned_connection(&hint, |connection| async move {
      let mut tx = Transaction::new(connection);
      tx.queue(cmd2("SET", key, "one"));
      tx.queue(cmd1("INCR", key));
      let replies = tx.exec().await?.ok_or_else(|| Error::protocol("transaction unexpectedly aborted"))?;
      assert_eq!(replies.len(), 2);
      Ok(())
    })
    .await?;

  let value: i64 = client
    .with_pinned_connection(&hint, |connection| async move { i64::from_value(connection.roundtrip(&cmd1("GET", key)).await?) })
    .await?;
  assert_eq!(value, 2);
  Ok(())
}

pub async fn should_abort_a_watched_transaction_on_concurrent_write(client: Client) -> Result<(), Error> {
  let key = "integration:multi:watch_abort";
  let hint = cmd1("GET", key);

  client.with_pinned_connection(&hint, |connection| async move { connection.roundtrip(&cmd2("SET", key, "initial")).await }).await?;

  let keys: &[&[u8]] = &[key.as_bytes()];
  let result: Option<Vec<Value>> = client
    .watch(keys, |connection| async move {
      // A write from outside this pinned connection, between WATCH and
      // EXEC, must abort the transaction (EXEC replies with a null array).
      let server = connection.server().clone();
      let mut other = Connection::connect(&server, &Config::default(), &ConnectionConfig::default()).await?;
      other.roundtrip(&cmd2("SET", key, "changed-by-someone-else")).await?;

      let mut tx = Transaction::new(connection);
      tx.queue(cmd2("SET", key, "should-not-apply"));
      tx.exec().await
    })
    .await?;

  assert!(result.is_none());
  Ok(())
}

/// Watching two keys that don't share a hash tag must raise `CrossSlot`
/// synchronously (spec §4.5.3), without ever issuing `WATCH` on the wire.
pub async fn should_reject_a_watch_spanning_multiple_slots(client: Client) -> Result<(), Error> {
  let keys: &[&[u8]] = &[b"integration:multi:crossslot:a", b"integration:multi:crossslot:b"];
  let err = client
    .watch(keys, |connection| async move {
      let mut tx = Transaction::new(connection);
      tx.queue(Command::new("PING"));
      tx.exec().await
    })
    .await
    .unwrap_err();
  assert_eq!(*err.kind(), redis_core::error::ErrorKind::CrossSlot);
  Ok(())
}

/// Two keys sharing a hash tag must route to the same slot and let the
/// watched transaction commit normally (spec §4.5.3).
pub async fn should_commit_a_watched_transaction_across_a_shared_hash_tag(client: Client) -> Result<(), Error> {
  let key_a = "integration:multi:{tag}:a";
  let key_b = "integration:multi:{tag}:b";
  let keys: &[&[u8]] = &[key_a.as_bytes(), key_b.as_bytes()];

  let replies = client
    .watch(keys, |connection| async move {
      let mut tx = Transaction::new(connection);
      tx.queue(cmd2("SET", key_a, "one"));
      tx.queue(cmd2("SET", key_b, "two"));
      tx.exec().await
    })
    .await?
    .ok_or_else(|| Error::protocol("transaction unexpectedly aborted"))?;

  assert_eq!(replies.len(), 2);
  Ok(())
}
