//! Observable state cell.
//!
//! [`ReactiveCell<S>`] wraps the store's state record. Reads go through
//! [`read`](ReactiveCell::read); writes go through [`update`](ReactiveCell::update),
//! which bumps a version counter and notifies watchers.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per `update`.
//! 2. Watchers are notified in registration order, after the write lock is
//!    released, so a watcher may read or write the cell again.
//! 3. Dropping a [`Subscription`] stops its watcher before the next
//!    notification. Dead watchers are pruned lazily during notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};

/// What a watcher learns about a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// Version after the write. The first write produces version 1.
    pub version: u64,
    /// Name of the mutation that wrote, if the write came through `commit`.
    pub mutation: Option<String>,
    pub at: DateTime<Utc>,
}

type WatchFn = dyn Fn(&StateChange) + Send + Sync;

/// RAII guard returned by [`ReactiveCell::watch`]. The watcher stays live
/// until this is dropped.
#[must_use = "dropping a Subscription immediately unsubscribes the watcher"]
pub struct Subscription {
    _watcher: Arc<WatchFn>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

struct CellInner<S> {
    value: RwLock<S>,
    version: AtomicU64,
    watchers: Mutex<Vec<Weak<WatchFn>>>,
}

/// Shared, version-tracked state wrapper. Cloning yields another handle to
/// the same value.
pub struct ReactiveCell<S> {
    inner: Arc<CellInner<S>>,
}

impl<S> Clone for ReactiveCell<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for ReactiveCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.inner.value.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ReactiveCell")
            .field("value", &*value)
            .field("version", &self.version())
            .finish()
    }
}

impl<S> ReactiveCell<S> {
    pub fn new(value: S) -> Self {
        Self {
            inner: Arc::new(CellInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of writes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Read the current value without bumping the version.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let value = self.inner.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&value)
    }

    /// Write the value in place, then notify watchers.
    ///
    /// `mutation` names the writer for [`StateChange::mutation`]. Writers on
    /// different threads may have their notifications delivered out of
    /// version order, but each [`StateChange::version`] matches its write.
    pub fn update<R>(&self, mutation: Option<&str>, f: impl FnOnce(&mut S) -> R) -> R {
        // The version is taken while the write lock is held, so version N is
        // always the Nth write. Notification happens after the lock is released.
        let (out, change) = {
            let mut value = self.inner.value.write().unwrap_or_else(PoisonError::into_inner);
            let out = f(&mut value);
            let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
            let change = StateChange {
                version,
                mutation: mutation.map(str::to_owned),
                at: Utc::now(),
            };
            (out, change)
        };
        self.notify(&change);
        out
    }

    /// Register a watcher called after every write.
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let strong: Arc<WatchFn> = Arc::new(watcher);
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&strong));
        Subscription { _watcher: strong }
    }

    /// Live watcher count (dropped subscriptions excluded).
    pub fn watcher_count(&self) -> usize {
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn notify(&self, change: &StateChange) {
        let live: Vec<Arc<WatchFn>> = {
            let mut watchers = self
                .inner
                .watchers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            watchers.retain(|w| w.strong_count() > 0);
            watchers.iter().filter_map(Weak::upgrade).collect()
        };
        for watcher in live {
            watcher(change);
        }
    }
}

impl<S: Clone> ReactiveCell<S> {
    /// Clone of the current value.
    pub fn snapshot(&self) -> S {
        self.read(S::clone)
    }
}
