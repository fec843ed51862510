//! Actions: named workflows that end in commits.

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::Store;

/// Handed to every action. Commits always target the store that dispatched
/// the action, even after the context is cloned into a spawned task.
///
/// State is read-only here; writes go through [`commit`](Self::commit).
pub struct ActionContext<S, P = serde_json::Value> {
    store: Store<S, P>,
}

impl<S, P> Clone for ActionContext<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S, P> ActionContext<S, P>
where
    S: Send + Sync + 'static,
    P: Send + 'static,
{
    pub(crate) fn new(store: Store<S, P>) -> Self {
        Self { store }
    }

    /// Bound `commit` of the originating store.
    pub fn commit(&self, mutation: &str, payload: P) -> Result<(), StoreError> {
        self.store.commit(mutation, payload)
    }

    /// Read live state.
    pub fn state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.store.state(f)
    }

    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.store.snapshot()
    }
}

/// An asynchronous action. `dispatch` polls it once inline and spawns the
/// remainder on the current tokio runtime.
///
/// # Example
///
/// ```ignore
/// struct Increase;
///
/// #[async_trait]
/// impl Action<Counter, i64> for Increase {
///     async fn run(&self, ctx: ActionContext<Counter, i64>, _: i64) -> anyhow::Result<()> {
///         tokio::time::sleep(Duration::from_millis(300)).await;
///         let next = ctx.state(|s| s.count) + 1;
///         ctx.commit("setCount", next)?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Action<S, P>: Send + Sync + 'static {
    async fn run(&self, ctx: ActionContext<S, P>, payload: P) -> Result<()>;
}

/// Adapts an async closure into an [`Action`].
pub struct AsyncFnAction<F>(pub F);

#[async_trait]
impl<S, P, F, Fut> Action<S, P> for AsyncFnAction<F>
where
    S: Send + Sync + 'static,
    P: Send + 'static,
    F: Fn(ActionContext<S, P>, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: ActionContext<S, P>, payload: P) -> Result<()> {
        (self.0)(ctx, payload).await
    }
}
