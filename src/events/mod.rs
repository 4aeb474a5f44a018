//! L7 instrumentation: the event sum type and its broadcast dispatcher
//! (spec §6, §9).
//!
//! The teacher's source keys listeners by event class through a
//! mutex-guarded map; per the spec's own redesign note (§9) this crate uses
//! a plain sum type plus `tokio::sync::broadcast` instead — subscribers
//! receive every event by value and filter with a `match`, which avoids a
//! second registration API alongside the one `tokio::sync::broadcast`
//! already provides.

use crate::{resilience::circuit_breaker::BreakerState, types::config::Server};
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;

/// One immutable, timestamped instrumentation event (spec §6).
#[derive(Debug, Clone)]
pub enum Event {
  ConnectionCreated { server: Server, timestamp: SystemTime },
  ConnectionConnected { server: Server, first_connection: bool, timestamp: SystemTime },
  ConnectionDisconnected { server: Server, timestamp: SystemTime },
  ConnectionError { server: Server, message: String, timestamp: SystemTime },
  ConnectionHealthCheck { server: Server, healthy: bool, timestamp: SystemTime },
  ConnectionMarkedForReconnect { server: Server, timestamp: SystemTime },
  PoolCreated { server: Server, size: usize, timestamp: SystemTime },
  PoolConnectionCreated { server: Server, timestamp: SystemTime },
  PoolConnectionAcquired { server: Server, wait: Duration, timestamp: SystemTime },
  PoolConnectionReleased { server: Server, timestamp: SystemTime },
  PoolExhausted { server: Server, timestamp: SystemTime },
  PoolReset { server: Server, timestamp: SystemTime },
  DatabaseFailed { server: Server, timestamp: SystemTime },
  DatabaseRecovered { server: Server, timestamp: SystemTime },
  Failover { from: Server, to: Server, timestamp: SystemTime },
  /// Not named in spec §6's list; carried regardless, per the instruction
  /// that ambient instrumentation concerns are never scoped out by a
  /// Non-goal. Mirrors §4.6's "state transitions emit an event carrying
  /// `{old, new, metrics_snapshot}`".
  CircuitBreakerStateChanged { old: BreakerState, new: BreakerState, failure_count: u32, timestamp: SystemTime },
}

/// How an error raised inside an event listener is handled (spec §7:
/// "caught, logged via the configured error handler, and never propagate to
/// the command caller").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorHandlerStrategy {
  Ignore,
  #[default]
  Log,
  Raise,
}

/// A broadcast-backed event dispatcher. Cloning shares the same channel —
/// every clone's subscribers see every emitted event.
#[derive(Clone)]
pub struct EventSink {
  tx: broadcast::Sender<Event>,
}

impl Default for EventSink {
  fn default() -> Self {
    EventSink::new(256)
  }
}

impl EventSink {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    EventSink { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Event> {
    self.tx.subscribe()
  }

  /// Broadcast `event`. A send with no subscribers is not an error — the
  /// spec treats listeners as optional observers, not required consumers.
  pub fn emit(&self, event: Event) {
    let _ = self.tx.send(event);
  }

  pub fn listener_count(&self) -> usize {
    self.tx.receiver_count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_receive_emitted_events() {
    let sink = EventSink::new(16);
    let mut rx = sink.subscribe();
    sink.emit(Event::PoolExhausted {
      server:    Server::new("127.0.0.1", 6379),
      timestamp: SystemTime::now(),
    });
    let received = rx.recv().await.unwrap();
    assert!(matches!(received, Event::PoolExhausted { .. }));
  }

  #[test]
  fn emit_without_subscribers_does_not_panic() {
    let sink = EventSink::new(16);
    sink.emit(Event::PoolReset {
      server:    Server::new("127.0.0.1", 6379),
      timestamp: SystemTime::now(),
    });
  }
}
