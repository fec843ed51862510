//! Handle returned by [`Store::dispatch`](crate::Store::dispatch).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::error::StoreError;

/// Outcome of a dispatch.
///
/// Synchronous actions, and async ones that finish without suspending, are
/// already settled when `dispatch` returns. Otherwise the rest of the action
/// runs on a spawned task; awaiting the handle waits for it, and dropping it
/// leaves it running.
#[must_use = "a dispatched async action keeps running; await this to observe its result"]
pub struct Dispatched {
    action: String,
    task: Option<JoinHandle<anyhow::Result<()>>>,
}

impl Dispatched {
    pub(crate) fn settled(action: &str) -> Self {
        Self {
            action: action.to_string(),
            task: None,
        }
    }

    pub(crate) fn pending(action: &str, task: JoinHandle<anyhow::Result<()>>) -> Self {
        Self {
            action: action.to_string(),
            task: Some(task),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// True once the action body has returned.
    pub fn is_settled(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl std::fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatched")
            .field("action", &self.action)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl Future for Dispatched {
    type Output = Result<(), StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let Some(task) = this.task.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let joined = match task.poll_unpin(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(joined) => joined,
        };
        this.task = None;

        Poll::Ready(match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(StoreError::ActionFailed {
                action: this.action.clone(),
                source,
            }),
            Err(_) => Err(StoreError::ActionAborted {
                action: this.action.clone(),
            }),
        })
    }
}
