//! Named-channel publish/subscribe bus.
//!
//! Channels are created on first [`on`](EventBus::on) and never removed.
//! Emission is synchronous and fans out in registration order.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::{BusError, ListenerFailure};

/// Listener callback. Returning `Err` counts as a listener failure.
pub type Listener<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// What emission does when a listener fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing listener; later listeners do not run.
    #[default]
    Abort,
    /// Run every listener and report all failures together.
    Isolate,
}

/// Bus configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub failure_policy: FailurePolicy,
}

struct BusInner<T> {
    channels: DashMap<String, Vec<Listener<T>>>,
    config: BusConfig,
}

/// Shared event bus. Cloning is cheap and every clone sees the same channels.
///
/// The payload type defaults to `serde_json::Value` for loosely typed use;
/// pick an application enum for typed channels.
pub struct EventBus<T = serde_json::Value> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.inner.channels.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: DashMap::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Append `listener` to `channel`. The same function registered twice
    /// runs twice per emission.
    pub fn on<F>(&self, channel: impl Into<String>, listener: F)
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_shared(channel, Arc::new(listener));
    }

    /// Append an already shared listener.
    pub fn on_shared(&self, channel: impl Into<String>, listener: Listener<T>) {
        let channel = channel.into();
        let mut entry = self.inner.channels.entry(channel.clone()).or_default();
        entry.push(listener);
        debug!(channel = %channel, listeners = entry.len(), "listener registered");
    }

    /// Notify every listener on `channel` with `payload`.
    ///
    /// Returns how many listeners ran. A channel nobody registered on is a
    /// silent no-op returning `Ok(0)`.
    pub fn emit(&self, channel: &str, payload: &T) -> Result<usize, BusError> {
        // Snapshot so listeners can register on this channel mid-emission
        // without holding the shard lock.
        let listeners: SmallVec<[Listener<T>; 4]> = match self.inner.channels.get(channel) {
            Some(list) => list.iter().cloned().collect(),
            None => {
                debug!(channel, "emit on channel with no listeners");
                return Ok(0);
            }
        };

        debug!(channel, listeners = listeners.len(), "emit");

        match self.inner.config.failure_policy {
            FailurePolicy::Abort => {
                for (index, listener) in listeners.iter().enumerate() {
                    if let Err(source) = listener(payload) {
                        warn!(channel, index, error = %source, "listener failed, aborting fan-out");
                        return Err(BusError::ListenerFailed {
                            channel: channel.to_string(),
                            index,
                            source,
                        });
                    }
                }
                Ok(listeners.len())
            }
            FailurePolicy::Isolate => {
                let mut failures = Vec::new();
                for (index, listener) in listeners.iter().enumerate() {
                    if let Err(error) = listener(payload) {
                        warn!(channel, index, error = %error, "listener failed, continuing");
                        failures.push(ListenerFailure { index, error });
                    }
                }
                if failures.is_empty() {
                    Ok(listeners.len())
                } else {
                    Err(BusError::ListenersFailed {
                        channel: channel.to_string(),
                        failures,
                    })
                }
            }
        }
    }

    /// Listeners currently registered on `channel`.
    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner
            .channels
            .get(channel)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    /// Names of every channel that has been registered on, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .channels
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&i32) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = log.clone();
        move |v: &i32| {
            log.lock().unwrap().push(format!("{tag}({v})"));
            Ok(())
        }
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = EventBus::<i32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("x", recorder(&log, "A"));
        bus.on("x", recorder(&log, "B"));
        bus.on("x", recorder(&log, "C"));

        assert_eq!(bus.emit("x", &7).unwrap(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["A(7)", "B(7)", "C(7)"]);
    }

    #[test]
    fn unknown_channel_is_a_no_op() {
        let bus = EventBus::<i32>::new();
        assert_eq!(bus.emit("never-registered", &1).unwrap(), 0);
        assert!(bus.channels().is_empty());
    }

    #[test]
    fn same_listener_twice_runs_twice() {
        let bus = EventBus::<i32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared: Listener<i32> = Arc::new(recorder(&log, "L"));
        bus.on_shared("x", shared.clone());
        bus.on_shared("x", shared);

        bus.emit("x", &1).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["L(1)", "L(1)"]);
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let bus = EventBus::<i32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("x", recorder(&log, "A"));
        bus.on("x", |_| anyhow::bail!("boom"));
        bus.on("x", recorder(&log, "C"));

        let err = bus.emit("x", &2).unwrap_err();
        match err {
            BusError::ListenerFailed { channel, index, .. } => {
                assert_eq!(channel, "x");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["A(2)"]);
    }

    #[test]
    fn isolate_policy_runs_everyone_and_collects() {
        let bus = EventBus::<i32>::with_config(BusConfig {
            failure_policy: FailurePolicy::Isolate,
        });
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("x", |_| anyhow::bail!("first"));
        bus.on("x", recorder(&log, "B"));
        bus.on("x", |_| anyhow::bail!("third"));

        let err = bus.emit("x", &3).unwrap_err();
        match err {
            BusError::ListenersFailed { failures, .. } => {
                let indexes: Vec<usize> = failures.iter().map(|f| f.index).collect();
                assert_eq!(indexes, vec![0, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["B(3)"]);
    }

    #[test]
    fn registration_during_emit_applies_to_next_emit() {
        let bus = EventBus::<i32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let bus2 = bus.clone();
            let log = log.clone();
            bus.on("x", move |_| {
                bus2.on("x", recorder(&log, "late"));
                Ok(())
            });
        }

        assert_eq!(bus.emit("x", &1).unwrap(), 1);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.listener_count("x"), 2);

        bus.emit("x", &2).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["late(2)"]);
    }

    #[test]
    fn config_deserializes_from_json() {
        let config: BusConfig = serde_json::from_str(r#"{"failure_policy":"isolate"}"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);

        let defaulted: BusConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaulted.failure_policy, FailurePolicy::Abort);
    }
}
