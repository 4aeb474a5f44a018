//! The client surface (spec §6/§9): [`Client`], the fluent [`Builder`] that
//! constructs one, and the round-robin [`Pool`] façade over several.

pub mod builder;
pub mod client;
pub mod pool;

pub use builder::Builder;
pub use client::{Client, PipelineGuard, Session};
pub use pool::Pool;
