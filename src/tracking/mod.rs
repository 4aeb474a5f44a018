//! L6: the server-assisted client-side tracking cache (spec §4.7).
//!
//! `CLIENT TRACKING ON` turns on invalidation push frames from the server;
//! [`cache::Cache`] is the LRU store those invalidations drain into, keyed
//! by [`cache::Cache::cache_key`]; [`consumer::run_invalidation_consumer`]
//! is the loop that drains a connection's push queue into it;
//! [`scope::cached`]/[`scope::uncached`] implement the OPTIN/OPTOUT
//! scope-block override.

pub mod cache;
pub mod consumer;
pub mod scope;

pub use cache::{tracking_on_command, Cache, CacheLookup};
pub use scope::{cached, uncached};
