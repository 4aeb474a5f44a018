//! The LRU cache store backing client-side tracking (spec §3 "cache entry",
//! §4.7).

use crate::{metrics::Metrics, types::config::TrackingConfig, types::Key, types::Value};
use parking_lot::Mutex;
use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::Arc,
  time::{Duration, Instant},
};

enum Entry {
  Value { value: Value, expires_at: Option<Instant> },
  InProgress,
}

/// The outcome of a cacheable-command lookup (spec §4.7 "Lookup contract").
pub enum CacheLookup {
  Hit(Value),
  Miss,
}

struct Inner {
  entries: HashMap<String, Entry>,
  recency: VecDeque<String>,
  /// redis key -> every cache key fingerprint that touches it, for O(1)
  /// invalidation fan-out (spec §4.7 "secondary index").
  by_redis_key: HashMap<Key, HashSet<String>>,
  /// reverse of the above, so eviction can clean `by_redis_key` without a
  /// linear scan.
  owner: HashMap<String, Key>,
}

pub struct Cache {
  config:  TrackingConfig,
  inner:   Mutex<Inner>,
  metrics: Arc<Metrics>,
}

impl Cache {
  pub fn new(config: TrackingConfig, metrics: Arc<Metrics>) -> Self {
    Cache {
      config,
      inner: Mutex::new(Inner {
        entries:      HashMap::new(),
        recency:      VecDeque::new(),
        by_redis_key: HashMap::new(),
        owner:        HashMap::new(),
      }),
      metrics,
    }
  }

  /// `<lowercased verb>|<redis key>|<canonicalized sub-args>` (spec §4.7):
  /// sub-args distinguish e.g. `HGET key f1` from `HGET key f2`.
  pub fn cache_key(verb: &str, key: &[u8], sub_args: &[&[u8]]) -> String {
    let mut out = verb.to_ascii_lowercase();
    out.push('|');
    out.push_str(&String::from_utf8_lossy(key));
    for arg in sub_args {
      out.push('|');
      out.push_str(&String::from_utf8_lossy(arg));
    }
    out
  }

  fn touch(inner: &mut Inner, cache_key: &str) {
    if let Some(pos) = inner.recency.iter().position(|k| k == cache_key) {
      inner.recency.remove(pos);
    }
    inner.recency.push_back(cache_key.to_string());
  }

  /// Look up `cache_key`. A present-but-expired entry is treated as a miss
  /// and dropped in the same pass.
  pub fn get(&self, cache_key: &str) -> CacheLookup {
    let mut inner = self.inner.lock();
    let expired = matches!(
      inner.entries.get(cache_key),
      Some(Entry::Value { expires_at: Some(at), .. }) if *at <= Instant::now()
    );
    if expired {
      self.remove_locked(&mut inner, cache_key);
    }

    match inner.entries.get(cache_key) {
      Some(Entry::Value { value, .. }) => {
        Self::touch(&mut inner, cache_key);
        self.metrics.record_cache_hit();
        CacheLookup::Hit(value.clone())
      },
      _ => {
        self.metrics.record_cache_miss();
        CacheLookup::Miss
      },
    }
  }

  /// Mark `cache_key` `IN_PROGRESS` ahead of issuing the command to the
  /// server (spec §4.7: "to signal concurrent awaiters that a fetch is in
  /// flight"). Registers the secondary index entry up front so an
  /// invalidation racing the in-flight fetch is not missed.
  pub fn mark_in_progress(&self, cache_key: &str, redis_key: &Key) {
    let mut inner = self.inner.lock();
    inner.entries.entry(cache_key.to_string()).or_insert(Entry::InProgress);
    inner.by_redis_key.entry(redis_key.clone()).or_default().insert(cache_key.to_string());
    inner.owner.insert(cache_key.to_string(), redis_key.clone());
  }

  /// Store the fetched value. Per the documented open-question decision
  /// (DESIGN.md): if a concurrent fetch for the same key already landed a
  /// real value, a late-arriving stale fetch does not clobber it — the
  /// `IN_PROGRESS` marker is a sentinel against overwrite, not a dedup
  /// mechanism (two concurrent misses still both call the server).
  pub fn store(&self, cache_key: &str, redis_key: &Key, value: Value) {
    let mut inner = self.inner.lock();
    let already_fresh = matches!(inner.entries.get(cache_key), Some(Entry::Value { .. }));
    if already_fresh {
      return;
    }

    let expires_at = self.config.default_ttl.map(|ttl| Instant::now() + ttl);
    inner.entries.insert(cache_key.to_string(), Entry::Value { value, expires_at });
    inner.by_redis_key.entry(redis_key.clone()).or_default().insert(cache_key.to_string());
    inner.owner.insert(cache_key.to_string(), redis_key.clone());
    Self::touch(&mut inner, cache_key);

    while inner.entries.len() > self.config.max_entries {
      let Some(oldest) = inner.recency.pop_front() else { break };
      self.remove_locked(&mut inner, &oldest);
      self.metrics.record_cache_eviction();
    }
  }

  fn remove_locked(&self, inner: &mut Inner, cache_key: &str) {
    inner.entries.remove(cache_key);
    if let Some(pos) = inner.recency.iter().position(|k| k == cache_key) {
      inner.recency.remove(pos);
    }
    if let Some(redis_key) = inner.owner.remove(cache_key) {
      if let Some(set) = inner.by_redis_key.get_mut(&redis_key) {
        set.remove(cache_key);
        if set.is_empty() {
          inner.by_redis_key.remove(&redis_key);
        }
      }
    }
  }

  /// Drop every cache entry that fingerprints `redis_key` (spec §4.7
  /// "Invalidation path"). Returns the count removed, for instrumentation.
  pub fn invalidate_key(&self, redis_key: &Key) -> usize {
    let mut inner = self.inner.lock();
    let keys: Vec<String> = inner.by_redis_key.remove(redis_key).map(|s| s.into_iter().collect()).unwrap_or_default();
    for key in &keys {
      inner.entries.remove(key);
      inner.owner.remove(key);
      if let Some(pos) = inner.recency.iter().position(|k| k == key) {
        inner.recency.remove(pos);
      }
    }
    self.metrics.record_cache_invalidation(keys.len() as u64);
    keys.len()
  }

  /// Clear everything (spec §4.7: "a null key list" invalidation push).
  pub fn invalidate_all(&self) {
    let mut inner = self.inner.lock();
    let count = inner.entries.len() as u64;
    inner.entries.clear();
    inner.recency.clear();
    inner.by_redis_key.clear();
    inner.owner.clear();
    self.metrics.record_cache_invalidation(count);
  }

  pub fn len(&self) -> usize {
    self.inner.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn config(&self) -> &TrackingConfig {
    &self.config
  }
}

/// Build the `CLIENT TRACKING ON [OPTIN|OPTOUT|BCAST] [PREFIX p ...]`
/// command a connection issues once, right after the HELLO/AUTH/SELECT
/// prelude, when the client was built with a [`TrackingConfig`] (spec §4.7
/// "Enablement").
pub fn tracking_on_command(config: &TrackingConfig) -> crate::protocol::command::Command {
  use crate::types::config::TrackingMode;

  let mut cmd = crate::protocol::command::Command::new("CLIENT").arg("TRACKING").arg("ON");
  cmd = match config.mode {
    TrackingMode::Default => cmd,
    TrackingMode::OptIn => cmd.arg("OPTIN"),
    TrackingMode::OptOut => cmd.arg("OPTOUT"),
    TrackingMode::Broadcast => cmd.arg("BCAST"),
  };
  for prefix in &config.bcast_prefixes {
    cmd = cmd.arg("PREFIX").arg(prefix.clone());
  }
  cmd.no_retry()
}


/// A TTL computed relative to now, for callers constructing a
/// [`TrackingConfig`] outside of `Default`.
pub fn ttl_from_secs(secs: u64) -> Duration {
  Duration::from_secs(secs)
}
