//! Testing utilities for Vessel.
//!
//! - [`RecordingListener`] captures every payload a bus channel delivers.
//! - [`ChangeRecorder`] captures the mutation names a store commits.
//! - [`counter`] builds the canonical counter store used across tests.

use std::sync::{Arc, Mutex, PoisonError};

use vessel_core::{EventBus, StateChange, Store, Subscription};

/// Collects payloads delivered to the bus channels it is attached to.
pub struct RecordingListener<T> {
    received: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for RecordingListener<T> {
    fn clone(&self) -> Self {
        Self {
            received: Arc::clone(&self.received),
        }
    }
}

impl<T> Default for RecordingListener<T> {
    fn default() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> RecordingListener<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register on `channel` of `bus`. Attaching twice records twice.
    pub fn attach(&self, bus: &EventBus<T>, channel: &str) {
        let received = Arc::clone(&self.received);
        bus.on(channel, move |payload: &T| {
            received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(payload.clone());
            Ok(())
        });
    }

    pub fn received(&self) -> Vec<T> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Records every change a store reports, for as long as it lives.
pub struct ChangeRecorder {
    changes: Arc<Mutex<Vec<StateChange>>>,
    _subscription: Subscription,
}

impl ChangeRecorder {
    pub fn attach<S, P>(store: &Store<S, P>) -> Self
    where
        S: Send + Sync + 'static,
        P: Send + 'static,
    {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        let subscription = store.watch(move |change| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(change.clone());
        });
        Self {
            changes,
            _subscription: subscription,
        }
    }

    pub fn changes(&self) -> Vec<StateChange> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutation names in commit order.
    pub fn mutations(&self) -> Vec<String> {
        self.changes()
            .into_iter()
            .filter_map(|c| c.mutation)
            .collect()
    }
}

pub mod counter {
    //! The counter store: `setCount`, delayed `increase`/`decrease`, `doubled`.

    use std::time::Duration;

    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use vessel_core::{ActionContext, Store};

    pub const DELAY: Duration = Duration::from_millis(300);

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Counter {
        pub count: i64,
    }

    fn adjust_later(ctx: &ActionContext<Counter, i64>, delta: i64) {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DELAY).await;
            let next = ctx.state(|s| s.count) + delta;
            if let Err(e) = ctx.commit("setCount", next) {
                tracing::warn!(error = %e, "deferred counter commit failed");
            }
        });
    }

    /// Must be built and dispatched inside a tokio runtime.
    pub fn store() -> Store<Counter, i64> {
        Store::builder(Counter::default())
            .mutation("setCount", |s: &mut Counter, n| s.count = n)
            .action("increase", |ctx, _| {
                adjust_later(ctx, 1);
                Ok(())
            })
            .action("decrease", |ctx, _| {
                adjust_later(ctx, -1);
                Ok(())
            })
            .getter("doubled", |s| json!(s.count * 2))
            .build()
    }
}
