//! A RESP3 Redis/Valkey client core: wire codec, connection lifecycle,
//! topology-aware routing (standalone, pool, Sentinel, Cluster, DNS,
//! Discovery Service, Active-Active), resilience primitives (retry,
//! circuit breaker, health checker, failure detector), and a
//! server-assisted client-side tracking cache.
//!
//! The generic entry point is [`clients::Client::call`]; [`interfaces`]
//! layers a small set of convenience command wrappers on top of it for the
//! command families gated by the `i-*` features.

pub mod clients;
pub mod connection;
pub mod error;
pub mod events;
pub mod interfaces;
pub mod metrics;
pub mod pool;
pub mod protocol;
pub mod resilience;
pub mod router;
pub mod tracking;
pub mod types;
