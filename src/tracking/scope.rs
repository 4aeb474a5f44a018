//! `cached { ... }` / `uncached { ... }` scope blocks (spec §4.7): force
//! caching on or off for the duration of a closure, overriding whatever
//! `TrackingMode` the client is configured with. Implemented as a
//! task-local override rather than a global so concurrent callers on
//! different tasks don't interfere with each other's scope.

use std::cell::Cell;

tokio::task_local! {
  static OVERRIDE: Cell<Option<bool>>;
  static CACHING_YES: Cell<bool>;
}

/// Force caching on for the duration of `f`, regardless of `TrackingMode`.
pub async fn cached<F, Fut, T>(f: F) -> T
where
  F: FnOnce() -> Fut,
  Fut: std::future::Future<Output = T>,
{
  run_scoped(Some(true), f).await
}

/// Force caching off for the duration of `f`, regardless of `TrackingMode`.
pub async fn uncached<F, Fut, T>(f: F) -> T
where
  F: FnOnce() -> Fut,
  Fut: std::future::Future<Output = T>,
{
  run_scoped(Some(false), f).await
}

async fn run_scoped<F, Fut, T>(value: Option<bool>, f: F) -> T
where
  F: FnOnce() -> Fut,
  Fut: std::future::Future<Output = T>,
{
  // Nested scopes restore the enclosing scope's value on exit, not always
  // `None` — `task_local!`'s own `scope` already handles this by value,
  // so restoration on every exit path (including a panic unwind) comes for
  // free rather than needing an explicit guard.
  OVERRIDE.scope(Cell::new(value), f()).await
}

/// The active scope override, if any, for the calling task. `None` means
/// "no override here — fall back to the client's configured `TrackingMode`".
pub fn current_override() -> Option<bool> {
  OVERRIDE.try_with(|cell| cell.get()).unwrap_or(None)
}

/// Mark the single command dispatched inside `f` as opted in to caching
/// (spec §4.7 OPTIN mode: "a `CLIENT CACHING YES` must precede a command to
/// mark it for tracking"). The flag is consumed by the first
/// [`take_caching_yes`] call inside the scope, so nesting more than one
/// dispatch in `f` only opts the first one in.
pub async fn caching_yes<F, Fut, T>(f: F) -> T
where
  F: FnOnce() -> Fut,
  Fut: std::future::Future<Output = T>,
{
  CACHING_YES.scope(Cell::new(true), f()).await
}

/// Read-and-clear the pending `CLIENT CACHING YES` flag for the calling
/// task. Outside of a [`caching_yes`] scope this is always `false`.
pub fn take_caching_yes() -> bool {
  CACHING_YES.try_with(|cell| cell.replace(false)).unwrap_or(false)
}

/// Decide whether a command should be cached, combining the scope override
/// (if any), the configured mode, and whether the caller issued
/// `CLIENT CACHING YES` immediately before this command (spec §4.7).
pub fn should_cache(mode: crate::types::config::TrackingMode, caching_yes_pending: bool) -> bool {
  use crate::types::config::TrackingMode;
  if let Some(forced) = current_override() {
    return forced;
  }
  match mode {
    TrackingMode::Default | TrackingMode::Broadcast => true,
    TrackingMode::OptIn => caching_yes_pending,
    TrackingMode::OptOut => !caching_yes_pending,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::config::TrackingMode;

  #[tokio::test]
  async fn uncached_block_forces_caching_off_under_default_mode() {
    assert!(should_cache(TrackingMode::Default, false));
    let result = uncached(|| async { should_cache(TrackingMode::Default, false) }).await;
    assert!(!result);
  }

  #[tokio::test]
  async fn cached_block_forces_caching_on_under_optin_mode() {
    assert!(!should_cache(TrackingMode::OptIn, false));
    let result = cached(|| async { should_cache(TrackingMode::OptIn, false) }).await;
    assert!(result);
  }

  #[tokio::test]
  async fn optout_mode_caches_unless_marked() {
    assert!(should_cache(TrackingMode::OptOut, false));
    assert!(!should_cache(TrackingMode::OptOut, true));
  }

  #[tokio::test]
  async fn scope_does_not_leak_outside_its_block() {
    uncached(|| async {}).await;
    assert_eq!(current_override(), None);
  }
}
