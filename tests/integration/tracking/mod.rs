//! Client-side tracking cache scenarios (spec §4.7, §8 "Tracking cache
//! scenario"): an invalidation pushed from a sibling connection's write
//! must evict the tracked client's cached copy.

use redis_core::{clients::Client, error::Error, interfaces::KeysInterface};
use std::time::Duration;
use tokio::time::sleep;

pub async fn should_serve_a_repeated_read_from_cache(tracked: Client, _sibling: Client) -> Result<(), Error> {
  let key = "integration:tracking:repeated_read";
  tracked.set(key, "one").await?;

  let before = tracked.metrics();
  let first: String = tracked.get(key).await?;
  assert_eq!(first, "one");
  let after_miss = tracked.metrics();
  assert_eq!(after_miss.cache_misses, before.cache_misses + 1);

  let second: String = tracked.get(key).await?;
  assert_eq!(second, "one");
  let after_hit = tracked.metrics();
  assert_eq!(after_hit.cache_hits, after_miss.cache_hits + 1);

  Ok(())
}

pub async fn should_invalidate_on_a_sibling_write(tracked: Client, sibling: Client) -> Result<(), Error> {
  let key = "integration:tracking:invalidate";
  tracked.set(key, "original").await?;

  let _: String = tracked.get(key).await?;
  let cached = tracked.metrics();

  sibling.set(key, "changed-by-sibling").await?;
  // The invalidation push frame arrives asynchronously on the tracked
  // client's connection; give the consumer loop a moment to drain it
  // before asserting the cache was cleared (spec §4.7 "Invalidation").
  sleep(Duration::from_millis(200)).await;

  let value: String = tracked.get(key).await?;
  assert_eq!(value, "changed-by-sibling");
  let after = tracked.metrics();
  assert_eq!(after.cache_misses, cached.cache_misses + 1);

  Ok(())
}
