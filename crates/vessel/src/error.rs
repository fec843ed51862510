//! Error types for store dispatch and bus emission.

use thiserror::Error;

/// Errors surfaced by [`Store`](crate::Store) operations.
///
/// The `Unknown*` variants are lookup failures: the name was never registered.
/// They are always returned to the caller, never swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `commit` named a mutation that was never registered.
    #[error("unknown mutation: {name}")]
    UnknownMutation { name: String },

    /// `dispatch` named an action that was never registered.
    #[error("unknown action: {name}")]
    UnknownAction { name: String },

    /// A getter read named a getter that was never registered.
    #[error("unknown getter: {name}")]
    UnknownGetter { name: String },

    /// The action body returned an error.
    #[error("action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// An async action was dispatched with no tokio runtime to spawn on.
    #[error("action '{action}' is async but no tokio runtime is running")]
    NoRuntime { action: String },

    /// A spawned action task panicked or was cancelled.
    #[error("action '{action}' aborted before completing")]
    ActionAborted { action: String },
}

impl StoreError {
    /// Returns true for the lookup family (unregistered name).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownMutation { .. }
                | StoreError::UnknownAction { .. }
                | StoreError::UnknownGetter { .. }
        )
    }
}

/// A single listener failure captured during emission.
#[derive(Debug)]
pub struct ListenerFailure {
    /// Position of the listener in registration order.
    pub index: usize,
    pub error: anyhow::Error,
}

/// Errors surfaced by [`EventBus::emit`](crate::EventBus::emit).
#[derive(Debug, Error)]
pub enum BusError {
    /// A listener failed and the remaining fan-out was skipped.
    #[error("listener {index} on channel '{channel}' failed: {source}")]
    ListenerFailed {
        channel: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// One or more listeners failed; every listener still ran.
    #[error("{} listener(s) on channel '{channel}' failed", .failures.len())]
    ListenersFailed {
        channel: String,
        failures: Vec<ListenerFailure>,
    },
}
