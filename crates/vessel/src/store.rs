//! The store: one state record, a mutation table, an action table, and an
//! optional getter table.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::{Action, ActionContext, AsyncFnAction};
use crate::dispatch::Dispatched;
use crate::error::StoreError;
use crate::getters::{Derived, GetterFn, Getters};
use crate::reactive::{ReactiveCell, StateChange, Subscription};

type MutationFn<S, P> = Arc<dyn Fn(&mut S, P) + Send + Sync>;
type SyncActionFn<S, P> =
    Arc<dyn Fn(&ActionContext<S, P>, P) -> anyhow::Result<()> + Send + Sync>;

enum ActionHandler<S, P> {
    Sync(SyncActionFn<S, P>),
    Async(Arc<dyn Action<S, P>>),
}

struct StoreInner<S, P> {
    id: Uuid,
    state: ReactiveCell<S>,
    mutations: HashMap<String, MutationFn<S, P>>,
    actions: HashMap<String, ActionHandler<S, P>>,
    getters: Option<Getters<S>>,
}

/// Single owner of application state.
///
/// State is read through [`state`](Self::state), written only by mutations
/// via [`commit`](Self::commit), and changed indirectly by actions via
/// [`dispatch`](Self::dispatch). Cloning yields another handle to the same
/// store.
pub struct Store<S, P = Value> {
    inner: Arc<StoreInner<S, P>>,
}

impl<S, P> Clone for Store<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: std::fmt::Debug, P> std::fmt::Debug for Store<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut mutations: Vec<&String> = self.inner.mutations.keys().collect();
        mutations.sort();
        let mut actions: Vec<&String> = self.inner.actions.keys().collect();
        actions.sort();
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state)
            .field("mutations", &mutations)
            .field("actions", &actions)
            .field("getters", &self.inner.getters)
            .finish()
    }
}

impl<S, P> Store<S, P>
where
    S: Send + Sync + 'static,
    P: Send + 'static,
{
    pub fn builder(state: S) -> StoreBuilder<S, P> {
        StoreBuilder::new(state)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Run mutation `name` against the state.
    ///
    /// Fails with [`StoreError::UnknownMutation`] without touching state if
    /// `name` was never registered.
    pub fn commit(&self, name: &str, payload: P) -> Result<(), StoreError> {
        let Some(mutation) = self.inner.mutations.get(name) else {
            warn!(store = %self.inner.id, mutation = name, "commit of unknown mutation");
            return Err(StoreError::UnknownMutation {
                name: name.to_string(),
            });
        };

        self.inner
            .state
            .update(Some(name), |state| mutation(state, payload));
        debug!(
            store = %self.inner.id,
            mutation = name,
            version = self.inner.state.version(),
            "committed"
        );
        Ok(())
    }

    /// Run action `name`.
    ///
    /// Synchronous actions finish before this returns; an error from the body
    /// comes back as [`StoreError::ActionFailed`]. Async actions run inline
    /// up to their first suspension point, so commits made before the first
    /// `.await` are visible when this returns; the remainder is spawned on the
    /// current tokio runtime and the returned [`Dispatched`] may be awaited
    /// for its result.
    pub fn dispatch(&self, name: &str, payload: P) -> Result<Dispatched, StoreError> {
        let Some(handler) = self.inner.actions.get(name) else {
            warn!(store = %self.inner.id, action = name, "dispatch of unknown action");
            return Err(StoreError::UnknownAction {
                name: name.to_string(),
            });
        };

        let ctx = ActionContext::new(self.clone());
        match handler {
            ActionHandler::Sync(action) => {
                debug!(store = %self.inner.id, action = name, "dispatch (sync)");
                action(&ctx, payload).map_err(|source| StoreError::ActionFailed {
                    action: name.to_string(),
                    source,
                })?;
                Ok(Dispatched::settled(name))
            }
            ActionHandler::Async(action) => {
                let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                    StoreError::NoRuntime {
                        action: name.to_string(),
                    }
                })?;
                debug!(store = %self.inner.id, action = name, "dispatch (async)");

                let action = Arc::clone(action);
                let mut body: BoxFuture<'static, anyhow::Result<()>> =
                    async move { action.run(ctx, payload).await }.boxed();

                // Run the body up to its first suspension before returning.
                let mut cx = Context::from_waker(noop_waker_ref());
                match body.poll_unpin(&mut cx) {
                    Poll::Ready(result) => {
                        result.map_err(|source| StoreError::ActionFailed {
                            action: name.to_string(),
                            source,
                        })?;
                        Ok(Dispatched::settled(name))
                    }
                    Poll::Pending => {
                        let action_name = name.to_string();
                        let task = runtime.spawn(async move {
                            let result = body.await;
                            if let Err(e) = &result {
                                warn!(action = %action_name, error = %e, "async action failed");
                            }
                            result
                        });
                        Ok(Dispatched::pending(name, task))
                    }
                }
            }
        }
    }

    /// Read the live state.
    pub fn state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.inner.state.read(f)
    }

    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.inner.state.snapshot()
    }

    /// Number of commits applied so far.
    pub fn version(&self) -> u64 {
        self.inner.state.version()
    }

    /// Called after every commit with the change record.
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.state.watch(watcher)
    }

    /// Getter table, present only if at least one getter was registered.
    pub fn getters(&self) -> Option<&Getters<S>> {
        self.inner.getters.as_ref()
    }

    /// Typed accessor that recomputes `f` on every `get()`.
    pub fn derive<T, F>(&self, f: F) -> Derived<S, T>
    where
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        Derived::new(self.inner.state.clone(), Arc::new(f))
    }

    pub fn has_mutation(&self, name: &str) -> bool {
        self.inner.mutations.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.inner.actions.contains_key(name)
    }
}

/// Builds a [`Store`]. Every table starts empty.
pub struct StoreBuilder<S, P = Value> {
    state: S,
    mutations: HashMap<String, MutationFn<S, P>>,
    actions: HashMap<String, ActionHandler<S, P>>,
    getters: HashMap<String, GetterFn<S>>,
}

impl<S: Default, P> Default for StoreBuilder<S, P> {
    fn default() -> Self {
        Self {
            state: S::default(),
            mutations: HashMap::new(),
            actions: HashMap::new(),
            getters: HashMap::new(),
        }
    }
}

impl<S, P> StoreBuilder<S, P>
where
    S: Send + Sync + 'static,
    P: Send + 'static,
{
    pub fn new(state: S) -> Self {
        Self {
            state,
            mutations: HashMap::new(),
            actions: HashMap::new(),
            getters: HashMap::new(),
        }
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut S, P) + Send + Sync + 'static,
    {
        let name = name.into();
        if self.mutations.insert(name.clone(), Arc::new(f)).is_some() {
            warn!(mutation = %name, "mutation registered twice, keeping the later one");
        }
        self
    }

    /// Register a synchronous action. It may commit before returning or
    /// move a clone of the context into a spawned task for deferred commits.
    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ActionContext<S, P>, P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert_action(name.into(), ActionHandler::Sync(Arc::new(f)));
        self
    }

    /// Register an async action implemented as an [`Action`].
    pub fn async_action(mut self, name: impl Into<String>, action: impl Action<S, P>) -> Self {
        self.insert_action(name.into(), ActionHandler::Async(Arc::new(action)));
        self
    }

    /// Register an async action from a closure returning a future.
    pub fn async_action_fn<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActionContext<S, P>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.async_action(name, AsyncFnAction(f))
    }

    pub fn getter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&S) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        if self.getters.insert(name.clone(), Arc::new(f)).is_some() {
            warn!(getter = %name, "getter registered twice, keeping the later one");
        }
        self
    }

    fn insert_action(&mut self, name: String, handler: ActionHandler<S, P>) {
        if self.actions.insert(name.clone(), handler).is_some() {
            warn!(action = %name, "action registered twice, keeping the later one");
        }
    }

    pub fn build(self) -> Store<S, P> {
        let state = ReactiveCell::new(self.state);
        let getters = if self.getters.is_empty() {
            None
        } else {
            Some(Getters::new(state.clone(), self.getters))
        };
        let id = Uuid::new_v4();
        debug!(
            store = %id,
            mutations = self.mutations.len(),
            actions = self.actions.len(),
            "store built"
        );

        Store {
            inner: Arc::new(StoreInner {
                id,
                state,
                mutations: self.mutations,
                actions: self.actions,
                getters,
            }),
        }
    }
}
