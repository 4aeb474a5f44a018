//! `Builder::build_pool` round-robin behavior against a live server (spec
//! §4.4). Unlike the other per-module test files, these don't take a
//! pre-connected `Client` from `utils::run_centralized` — they build their
//! own `clients::Pool` directly so they can assert on round-robin fanout.

use redis_core::{
  clients::Builder,
  error::Error,
  interfaces::{KeysInterface, ServerInterface},
  types::config::Config,
};

async fn connected_pool(size: usize) -> Result<redis_core::clients::Pool, Error> {
  let config = Config {
    server: crate::integration::utils::centralized_server_config(),
    ..Config::default()
  };
  let pool = Builder::from_config(config).build_pool(size)?;
  pool.init().await?;
  Ok(pool)
}

pub async fn should_ping_every_client_in_the_pool() -> Result<(), Error> {
  let pool = connected_pool(3).await?;
  for _ in 0 .. pool.clients().len() * 2 {
    pool.ping().await?;
  }
  Ok(())
}

pub async fn should_round_robin_across_clients() -> Result<(), Error> {
  let pool = connected_pool(2).await?;
  let key = "integration:pool:round_robin";
  pool.acquire().del(key).await?;
  pool.acquire().set(key, "value").await?;
  let value: String = pool.acquire().get(key).await?;
  assert_eq!(value, "value");
  Ok(())
}
