//! Health-check runner (spec §4.6): periodically probes a set of monitored
//! endpoints with `probes` PINGs separated by `probe_delay`, aggregates the
//! probe outcomes per a configurable policy, and invokes callbacks when an
//! endpoint's health changes.
//!
//! Generic over the probe itself (`Fn(&Server) -> Future<Output = bool>`)
//! rather than hard-coding a `Connection::ping` call, so both the
//! active-active router (probing whole regions) and a plain Sentinel/Cluster
//! deployment can reuse the same runner against their own notion of "the
//! connection for this server".

use crate::types::config::Server;
use parking_lot::Mutex;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthPolicy {
  All,
  Majority,
  Any,
}

impl HealthPolicy {
  /// Reduce `probes` independent PING outcomes (spec §4.6: "the endpoint's
  /// health is the policy over probe results").
  pub fn evaluate(&self, outcomes: &[bool]) -> bool {
    if outcomes.is_empty() {
      return false;
    }
    let healthy = outcomes.iter().filter(|ok| **ok).count();
    match self {
      HealthPolicy::All => healthy == outcomes.len(),
      HealthPolicy::Any => healthy > 0,
      HealthPolicy::Majority => healthy * 2 > outcomes.len(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
  pub interval:    Duration,
  pub probes:      u32,
  pub probe_delay: Duration,
  pub policy:      HealthPolicy,
}

impl Default for HealthCheckConfig {
  fn default() -> Self {
    HealthCheckConfig {
      interval:    Duration::from_secs(10),
      probes:      3,
      probe_delay: Duration::from_millis(100),
      policy:      HealthPolicy::Majority,
    }
  }
}

pub struct HealthChecker {
  config:    HealthCheckConfig,
  servers:   Vec<Server>,
  healthy:   Mutex<HashMap<Server, bool>>,
  callbacks: Mutex<Vec<Box<dyn Fn(&Server, bool) + Send + Sync>>>,
}

impl HealthChecker {
  pub fn new(config: HealthCheckConfig, servers: Vec<Server>) -> Self {
    let healthy = servers.iter().cloned().map(|s| (s, true)).collect();
    HealthChecker {
      config,
      servers,
      healthy: Mutex::new(healthy),
      callbacks: Mutex::new(Vec::new()),
    }
  }

  pub fn on_change(&self, callback: impl Fn(&Server, bool) + Send + Sync + 'static) {
    self.callbacks.lock().push(Box::new(callback));
  }

  pub fn is_healthy(&self, server: &Server) -> bool {
    self.healthy.lock().get(server).copied().unwrap_or(false)
  }

  /// Run `probes` PINGs against every monitored endpoint once, sleeping
  /// `probe_delay` between probes on the same endpoint, and update health
  /// state. A real deployment calls this in a loop on `interval`; exposed
  /// standalone so tests don't need to drive a timer.
  pub async fn check_once<F, Fut>(&self, probe: F)
  where
    F: Fn(Server) -> Fut,
    Fut: Future<Output = bool>,
  {
    for server in &self.servers {
      let mut outcomes = Vec::with_capacity(self.config.probes as usize);
      for i in 0 .. self.config.probes {
        outcomes.push(probe(server.clone()).await);
        if i + 1 < self.config.probes {
          tokio::time::sleep(self.config.probe_delay).await;
        }
      }
      let healthy = self.config.policy.evaluate(&outcomes);
      let changed = {
        let mut state = self.healthy.lock();
        let previous = state.insert(server.clone(), healthy);
        previous != Some(healthy)
      };
      if changed {
        for callback in self.callbacks.lock().iter() {
          callback(server, healthy);
        }
      }
    }
  }

  /// Spawn the periodic runner as a background task. Dropping the returned
  /// handle does not stop it; callers abort it explicitly on shutdown.
  pub fn spawn<F, Fut>(self: Arc<Self>, probe: F) -> tokio::task::JoinHandle<()>
  where
    F: Fn(Server) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send,
  {
    let interval = self.config.interval;
    tokio::spawn(async move {
      loop {
        self.check_once(&probe).await;
        tokio::time::sleep(interval).await;
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn policy_evaluation() {
    assert!(HealthPolicy::All.evaluate(&[true, true, true]));
    assert!(!HealthPolicy::All.evaluate(&[true, false, true]));
    assert!(HealthPolicy::Any.evaluate(&[false, false, true]));
    assert!(!HealthPolicy::Any.evaluate(&[false, false, false]));
    assert!(HealthPolicy::Majority.evaluate(&[true, true, false]));
    assert!(!HealthPolicy::Majority.evaluate(&[true, false, false]));
  }

  #[tokio::test]
  async fn check_once_marks_a_failing_endpoint_unhealthy_and_fires_callback() {
    let server = Server::new("127.0.0.1", 6379);
    let checker = Arc::new(HealthChecker::new(
      HealthCheckConfig {
        interval:    Duration::from_secs(1),
        probes:      3,
        probe_delay: Duration::from_millis(1),
        policy:      HealthPolicy::All,
      },
      vec![server.clone()],
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    checker.on_change(move |s, healthy| seen_clone.lock().push((s.clone(), healthy)));

    assert!(checker.is_healthy(&server));
    checker.check_once(|_| async { false }).await;
    assert!(!checker.is_healthy(&server));
    assert_eq!(seen.lock().as_slice(), &[(server.clone(), false)]);
  }

  #[tokio::test]
  async fn check_once_is_a_noop_when_health_does_not_change() {
    let server = Server::new("127.0.0.1", 6379);
    let checker = HealthChecker::new(
      HealthCheckConfig {
        interval:    Duration::from_secs(1),
        probes:      1,
        probe_delay: Duration::from_millis(1),
        policy:      HealthPolicy::Any,
      },
      vec![server.clone()],
    );
    let calls = Arc::new(Mutex::new(0));
    let calls_clone = calls.clone();
    checker.on_change(move |_, _| *calls_clone.lock() += 1);
    checker.check_once(|_| async { true }).await;
    assert_eq!(*calls.lock(), 0, "already-healthy endpoint staying healthy must not fire a callback");
  }
}
