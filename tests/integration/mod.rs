#[macro_use]
pub mod utils;

#[cfg(feature = "i-client")]
mod client;
#[cfg(feature = "i-cluster")]
mod cluster;
#[cfg(feature = "i-hashes")]
mod hashes;
#[cfg(feature = "i-keys")]
mod keys;
#[cfg(feature = "i-lists")]
mod lists;
#[cfg(feature = "transactions")]
mod multi;
mod other;
mod pool;
#[cfg(feature = "i-pubsub")]
mod pubsub;
#[cfg(feature = "i-server")]
mod server;
#[cfg(feature = "tracking")]
mod tracking;

pub mod centralized;
pub mod clustered;
