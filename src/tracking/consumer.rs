//! Drains the connection's push queue for `invalidate` frames and applies
//! them to a [`Cache`] (spec §4.7 "Invalidation path").

use crate::{tracking::cache::Cache, types::{Key, Value}};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Interpret one push frame. Returns `None` for anything that isn't a
/// tracking invalidation (e.g. a pub/sub `message` push) so the caller can
/// route those elsewhere.
pub fn parse_invalidation(push: &Value) -> Option<Option<Vec<Key>>> {
  if push.push_kind()? != "invalidate" {
    return None;
  }
  let items = match push {
    Value::Push(items) => items,
    _ => return None,
  };
  match items.get(1) {
    Some(Value::Array(None)) | None => Some(None),
    Some(Value::Array(Some(keys))) => {
      let keys = keys
        .iter()
        .filter_map(|v| v.as_bytes().map(|b| Key::from(bytes::Bytes::copy_from_slice(b))))
        .collect();
      Some(Some(keys))
    },
    _ => None,
  }
}

/// Apply one already-parsed invalidation to `cache`.
pub fn apply_invalidation(cache: &Cache, invalidation: Option<Vec<Key>>) {
  match invalidation {
    None => cache.invalidate_all(),
    Some(keys) => {
      for key in &keys {
        cache.invalidate_key(key);
      }
    },
  }
}

/// Run forever, draining `push_rx` and applying every `invalidate` frame to
/// `cache`. Intended to be spawned once per tracked connection; exits when
/// the channel closes (the connection was dropped).
pub async fn run_invalidation_consumer(cache: Arc<Cache>, mut push_rx: broadcast::Receiver<Value>) {
  loop {
    match push_rx.recv().await {
      Ok(push) => {
        if let Some(invalidation) = parse_invalidation(&push) {
          apply_invalidation(&cache, invalidation);
        }
      },
      Err(broadcast::error::RecvError::Lagged(_)) => continue,
      Err(broadcast::error::RecvError::Closed) => return,
    }
  }
}
