//! Cross-cutting client lifecycle scenarios: connect/fail-fast behavior,
//! graceful and concurrent `quit`, pipelining, and pool-exhaustion
//! instrumentation (spec §4.4, §4.6, §9).

use crate::integration::utils;
use redis_core::{
  clients::{Builder, Client},
  connection::Pipeline,
  error::{Error, ErrorKind},
  protocol::{cmd1, cmd2},
  types::{
    config::{Config, ConnectionConfig, Server, ServerConfig},
    FromValue,
  },
};
use std::time::Duration;

fn centralized_config() -> Config {
  Config {
    server: utils::centralized_server_config(),
    ..Config::default()
  }
}

fn bad_host_config() -> Config {
  Config {
    fail_fast: true,
    server: ServerConfig::Centralized {
      server: Server::new("incorrecthost.invalid", 1234),
    },
    ..Config::default()
  }
}

pub async fn should_connect_and_ping() -> Result<(), Error> {
  let client = Builder::from_config(centralized_config()).build()?;
  let handle = client.connect();
  client.wait_for_connect().await?;

  client.ping().await?;
  client.quit().await?;
  handle.await.map_err(|_| Error::new(ErrorKind::Canceled, "connect task panicked"))??;
  Ok(())
}

pub async fn should_fail_to_connect_with_a_bad_host() -> Result<(), Error> {
  let client = Builder::from_config(bad_host_config()).build()?;
  let _handle = client.connect();
  assert!(client.wait_for_connect().await.is_err());
  Ok(())
}

pub async fn pool_should_connect_and_ping() -> Result<(), Error> {
  let pool = Builder::from_config(centralized_config()).build_pool(3)?;
  let handle = pool.init().await?;

  pool.ping().await?;
  pool.quit().await?;
  handle.await.map_err(|_| Error::new(ErrorKind::Canceled, "connect task panicked"))??;
  Ok(())
}

pub async fn pool_should_fail_to_connect_with_a_bad_host() -> Result<(), Error> {
  let pool = Builder::from_config(bad_host_config()).build_pool(3)?;
  let _handle = pool.connect();
  assert!(pool.wait_for_connect().await.is_err());
  Ok(())
}

pub async fn should_gracefully_quit(client: Client) -> Result<(), Error> {
  client.ping().await?;
  client.quit().await
}

pub async fn should_not_hang_on_concurrent_quit(client: Client) -> Result<(), Error> {
  let other = client.clone();
  let task1 = tokio::spawn(async move { client.quit().await });
  let task2 = tokio::spawn(async move { other.quit().await });
  task1.await.map_err(|_| Error::new(ErrorKind::Canceled, "quit task panicked"))??;
  task2.await.map_err(|_| Error::new(ErrorKind::Canceled, "quit task panicked"))??;
  Ok(())
}

#[cfg(feature = "i-keys")]
pub async fn should_pipeline_and_preserve_reply_order(client: Client) -> Result<(), Error> {
  let key_a = "integration:other:pipeline:a";
  let key_b = "integration:other:pipeline:b";
  let hint = cmd1("DEL", key_a);

  let replies = client
    .with_pinned_connection(&hint, |connection| async move {
      let mut pipeline = Pipeline::new(connection);
      pipeline.queue(cmd2("SET", key_a, "1"));
      pipeline.queue(cmd2("SET", key_b, "2"));
      pipeline.queue(cmd1("INCR", key_a));
      pipeline.exec().await
    })
    .await?;

  assert_eq!(replies.len(), 3);
  let last = replies.into_iter().nth(2).unwrap()?;
  let incremented = i64::from_value(last)?;
  assert_eq!(incremented, 2);
  Ok(())
}

#[cfg(all(feature = "i-keys", feature = "i-hashes"))]
pub async fn should_not_short_circuit_on_an_early_pipeline_error(client: Client) -> Result<(), Error> {
  let key = "integration:other:pipeline:error_early";
  let hint = cmd1("DEL", key);

  let replies = client
    .with_pinned_connection(&hint, |connection| async move {
      let mut pipeline = Pipeline::new(connection);
      pipeline.queue(cmd2("SET", key, "not-a-hash"));
      pipeline.queue(cmd1("HGETALL", key));
      pipeline.queue(cmd1("INCR", key));
      pipeline.exec().await
    })
    .await?;

  assert_eq!(replies.len(), 3);
  assert!(replies[0].is_ok());
  assert!(replies[1].is_err());
  assert!(replies[2].is_err());
  Ok(())
}

#[cfg(feature = "i-keys")]
pub async fn should_reuse_a_pipeline_across_batches(client: Client) -> Result<(), Error> {
  let key = "integration:other:pipeline:reuse";
  let hint = cmd1("DEL", key);

  client.with_pinned_connection(&hint, |connection| async move { connection.roundtrip(&cmd1("DEL", key)).await }).await?;

  let first = client
    .with_pinned_connection(&hint, |connection| async move {
      let mut pipeline = Pipeline::new(connection);
      pipeline.queue(cmd1("INCR", key));
      let replies = pipeline.exec_all().await?;
      i64::from_value(replies.into_iter().next().unwrap())
    })
    .await?;
  assert_eq!(first, 1);

  let second = client
    .with_pinned_connection(&hint, |connection| async move {
      let mut pipeline = Pipeline::new(connection);
      pipeline.queue(cmd1("INCR", key));
      let replies = pipeline.exec_all().await?;
      i64::from_value(replies.into_iter().next().unwrap())
    })
    .await?;
  assert_eq!(second, 2);
  Ok(())
}

/// Holds the pool's single connection pinned while a second call races for
/// it, asserting both the `PoolExhausted` error and the metric it bumps
/// (spec §4.4 "exhaustion ... reported to the instrumentation sink").
pub async fn should_report_pool_exhaustion_metric() -> Result<(), Error> {
  let conn_cfg = ConnectionConfig {
    connect_timeout: Duration::from_millis(200),
    ..ConnectionConfig::default()
  };
  let client = Builder::from_config(centralized_config()).set_connection_config(conn_cfg).set_pool_size(1).build()?;
  client.connect();
  client.wait_for_connect().await?;

  let hint = cmd1("GET", "integration:other:pool_exhaustion");
  let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
  let held = client.clone();
  let held_hint = hint.clone();
  let holder = tokio::spawn(async move {
    held
      .with_pinned_connection(&held_hint, |_connection| async move {
        let _ = release_rx.await;
        Ok(())
      })
      .await
  });

  tokio::time::sleep(Duration::from_millis(50)).await;
  let before = client.metrics().pool_exhausted;
  let result = client.ping().await;
  assert!(result.is_err());
  assert_eq!(*result.unwrap_err().kind(), ErrorKind::PoolExhausted);
  let after = client.metrics().pool_exhausted;
  assert_eq!(after, before + 1);

  let _ = release_tx.send(());
  holder.await.map_err(|_| Error::new(ErrorKind::Canceled, "holder task panicked"))??;
  Ok(())
}
