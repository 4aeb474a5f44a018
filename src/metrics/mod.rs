//! L7 instrumentation: the pool/cache metrics sink (spec §2 L7, §4.4,
//! §4.7). Plain atomic counters rather than a histogram library — the
//! teacher crate leaves metrics export to the embedding application
//! (its own `metrics` feature only gates *emission points*, not a backend),
//! so this sink mirrors that shape: cheap counters an application can poll
//! or wire into its own exporter.

use std::{
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

/// Pool checkout/release counters plus the tracking cache's hit/miss/evict
/// counters, all in one sink since both are reported "to the instrumentation
/// sink" per spec §4.4 and §4.7.
#[derive(Default)]
pub struct Metrics {
  pool_checkouts:       AtomicU64,
  pool_checkout_wait_micros: AtomicU64,
  pool_releases:        AtomicU64,
  pool_exhausted:       AtomicU64,
  cache_hits:           AtomicU64,
  cache_misses:         AtomicU64,
  cache_evictions:      AtomicU64,
  cache_invalidations:  AtomicU64,
}

impl Metrics {
  pub fn record_checkout(&self, wait: Duration) {
    self.pool_checkouts.fetch_add(1, Ordering::Relaxed);
    self.pool_checkout_wait_micros.fetch_add(wait.as_micros() as u64, Ordering::Relaxed);
  }

  pub fn record_release(&self) {
    self.pool_releases.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_pool_exhausted(&self) {
    self.pool_exhausted.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_cache_hit(&self) {
    self.cache_hits.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_cache_miss(&self) {
    self.cache_misses.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_cache_eviction(&self) {
    self.cache_evictions.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_cache_invalidation(&self, count: u64) {
    self.cache_invalidations.fetch_add(count, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      pool_checkouts:      self.pool_checkouts.load(Ordering::Relaxed),
      pool_checkout_wait_micros: self.pool_checkout_wait_micros.load(Ordering::Relaxed),
      pool_releases:       self.pool_releases.load(Ordering::Relaxed),
      pool_exhausted:      self.pool_exhausted.load(Ordering::Relaxed),
      cache_hits:          self.cache_hits.load(Ordering::Relaxed),
      cache_misses:        self.cache_misses.load(Ordering::Relaxed),
      cache_evictions:     self.cache_evictions.load(Ordering::Relaxed),
      cache_invalidations: self.cache_invalidations.load(Ordering::Relaxed),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
  pub pool_checkouts:          u64,
  pub pool_checkout_wait_micros: u64,
  pub pool_releases:           u64,
  pub pool_exhausted:          u64,
  pub cache_hits:              u64,
  pub cache_misses:            u64,
  pub cache_evictions:         u64,
  pub cache_invalidations:     u64,
}

impl MetricsSnapshot {
  pub fn cache_hit_rate(&self) -> f64 {
    let total = self.cache_hits + self.cache_misses;
    if total == 0 {
      0.0
    } else {
      self.cache_hits as f64 / total as f64
    }
  }
}
