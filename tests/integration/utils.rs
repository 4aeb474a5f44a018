#![allow(unused_macros)]
#![allow(unused_imports)]
#![allow(dead_code)]

use redis_core::{
  clients::{builder::Builder, client::Client},
  error::Error,
  types::config::{Config, ConnectionConfig, PerformanceConfig, ReconnectPolicy, Server, ServerConfig, TrackingConfig},
};
use std::{env, future::Future, time::Duration};

pub fn read_env_var(name: &str) -> Option<String> {
  env::var_os(name).and_then(|s| s.into_string().ok())
}

fn read_fail_fast_env() -> bool {
  !matches!(read_env_var("REDIS_CORE_NO_FAIL_FAST").as_deref(), Some("1") | Some("true"))
}

pub fn read_redis_centralized_host() -> (String, u16) {
  let host = read_env_var("REDIS_CORE_CENTRALIZED_HOST").unwrap_or_else(|| "127.0.0.1".into());
  let port = read_env_var("REDIS_CORE_CENTRALIZED_PORT").and_then(|s| s.parse().ok()).unwrap_or(6379);
  (host, port)
}

pub fn read_redis_cluster_host() -> (String, u16) {
  let host = read_env_var("REDIS_CORE_CLUSTER_HOST").unwrap_or_else(|| "127.0.0.1".into());
  let port = read_env_var("REDIS_CORE_CLUSTER_PORT").and_then(|s| s.parse().ok()).unwrap_or(30001);
  (host, port)
}

pub fn read_redis_password() -> Option<String> {
  read_env_var("REDIS_PASSWORD")
}

pub fn centralized_server_config() -> ServerConfig {
  let (host, port) = read_redis_centralized_host();
  ServerConfig::Centralized {
    server: Server::new(host, port),
  }
}

pub fn cluster_server_config() -> ServerConfig {
  let (host, port) = read_redis_cluster_host();
  ServerConfig::Clustered {
    hosts:  vec![Server::new(host, port)],
    policy: Default::default(),
  }
}

fn base_config(cluster: bool) -> Config {
  let server = if cluster { cluster_server_config() } else { centralized_server_config() };

  Config {
    fail_fast: read_fail_fast_env(),
    server,
    password: read_redis_password(),
    ..Config::default()
  }
}

async fn run_with<F, Fut>(config: Config, func: F)
where
  F: FnOnce(Client) -> Fut,
  Fut: Future<Output = Result<(), Error>>,
{
  let client = Builder::from_config(config)
    .set_connection_config(ConnectionConfig::default())
    .set_performance_config(PerformanceConfig {
      default_command_timeout: Duration::from_secs(10),
      ..PerformanceConfig::default()
    })
    .set_policy(ReconnectPolicy::new_constant(3, 250))
    .build()
    .expect("failed to build client");

  let handle = client.connect();
  client.wait_for_connect().await.expect("failed to connect client");

  match func(client.clone()).await {
    Ok(()) => {
      let _ = client.quit().await;
      let _ = handle.await;
    },
    Err(err) => {
      let _ = client.quit().await;
      panic!("test failed: {err}");
    },
  }
}

/// Connects a plain (Centralized) client and runs `func` against it.
pub async fn run_centralized<F, Fut>(func: F)
where
  F: FnOnce(Client) -> Fut,
  Fut: Future<Output = Result<(), Error>>,
{
  run_with(base_config(false), func).await;
}

/// Connects a Cluster client and runs `func` against it. Scenarios
/// registered under this runner must stick to single-key (or
/// same-hash-tag) commands so they don't trip `CROSSSLOT` (spec §4.5.3).
pub async fn run_cluster<F, Fut>(func: F)
where
  F: FnOnce(Client) -> Fut,
  Fut: Future<Output = Result<(), Error>>,
{
  run_with(base_config(true), func).await;
}

/// Connects a Centralized client with tracking enabled and runs `func`
/// against it plus a second, untracked client to the same server (spec
/// §8 "Tracking cache scenario": invalidations arrive from a sibling
/// connection).
pub async fn run_centralized_with_tracking<F, Fut>(tracking: TrackingConfig, func: F)
where
  F: FnOnce(Client, Client) -> Fut,
  Fut: Future<Output = Result<(), Error>>,
{
  let config = base_config(false);
  let tracked = Builder::from_config(config.clone())
    .set_tracking_config(tracking)
    .build()
    .expect("failed to build tracked client");
  let sibling = Builder::from_config(config).build().expect("failed to build sibling client");

  let tracked_handle = tracked.connect();
  let sibling_handle = sibling.connect();
  tracked.wait_for_connect().await.expect("tracked client failed to connect");
  sibling.wait_for_connect().await.expect("sibling client failed to connect");

  match func(tracked.clone(), sibling.clone()).await {
    Ok(()) => {
      let _ = tracked.quit().await;
      let _ = sibling.quit().await;
      let _ = tracked_handle.await;
      let _ = sibling_handle.await;
    },
    Err(err) => {
      let _ = tracked.quit().await;
      let _ = sibling.quit().await;
      panic!("test failed: {err}");
    },
  }
}

/// Registers `$name` (a `pub async fn(Client) -> Result<(), Error>` in
/// `$module`) as a `#[tokio::test]` run against a fresh Centralized
/// connection. Requires a reachable server (`REDIS_CORE_CENTRALIZED_HOST`/
/// `_PORT`, default `127.0.0.1:6379`) — skipped via `#[ignore]` like the
/// rest of this docker-backed integration tree.
macro_rules! centralized_test(
  ($module:tt, $name:tt) => {
    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a live Redis server"]
    async fn $name() {
      let _ = pretty_env_logger::try_init();
      crate::integration::utils::run_centralized(crate::integration::$module::$name).await;
    }
  }
);

macro_rules! cluster_test(
  ($module:tt, $name:tt) => {
    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a live Redis Cluster deployment"]
    async fn $name() {
      let _ = pretty_env_logger::try_init();
      crate::integration::utils::run_cluster(crate::integration::$module::$name).await;
    }
  }
);

/// Registers a test function that manages its own connection(s) (e.g. a
/// `clients::Pool` built directly rather than a single harness-provided
/// `Client`) rather than going through [`run_centralized`]/[`run_cluster`].
macro_rules! standalone_test(
  ($module:tt, $name:tt) => {
    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a live Redis server"]
    async fn $name() {
      let _ = pretty_env_logger::try_init();
      crate::integration::$module::$name().await.expect("test failed");
    }
  }
);

/// Registers a tracking-cache scenario (a `pub async fn(Client, Client) ->
/// Result<(), Error>` in `$module`) run via
/// [`run_centralized_with_tracking`] with the default `TrackingConfig`.
macro_rules! tracking_test(
  ($module:tt, $name:tt) => {
    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a live Redis server"]
    async fn $name() {
      let _ = pretty_env_logger::try_init();
      crate::integration::utils::run_centralized_with_tracking(Default::default(), crate::integration::$module::$name).await;
    }
  }
);
