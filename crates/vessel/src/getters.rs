//! Derived values. Nothing here caches: every read recomputes from the
//! current state, so a read can never be stale.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StoreError;
use crate::reactive::ReactiveCell;

pub(crate) type GetterFn<S> = Arc<dyn Fn(&S) -> Value + Send + Sync>;

/// Named getter table of a store.
pub struct Getters<S> {
    cell: ReactiveCell<S>,
    table: HashMap<String, GetterFn<S>>,
}

impl<S> Getters<S> {
    pub(crate) fn new(cell: ReactiveCell<S>, table: HashMap<String, GetterFn<S>>) -> Self {
        Self { cell, table }
    }

    /// Run getter `name` against current state.
    pub fn get(&self, name: &str) -> Result<Value, StoreError> {
        let getter = self
            .table
            .get(name)
            .ok_or_else(|| StoreError::UnknownGetter {
                name: name.to_string(),
            })?;
        Ok(self.cell.read(|state| getter(state)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Registered getter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<S> std::fmt::Debug for Getters<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getters")
            .field("names", &self.names())
            .finish()
    }
}

/// Typed zero-argument accessor built by [`Store::derive`](crate::Store::derive).
pub struct Derived<S, T> {
    cell: ReactiveCell<S>,
    compute: Arc<dyn Fn(&S) -> T + Send + Sync>,
}

impl<S, T> Clone for Derived<S, T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            compute: Arc::clone(&self.compute),
        }
    }
}

impl<S, T> Derived<S, T> {
    pub(crate) fn new(cell: ReactiveCell<S>, compute: Arc<dyn Fn(&S) -> T + Send + Sync>) -> Self {
        Self { cell, compute }
    }

    pub fn get(&self) -> T {
        self.cell.read(|state| (self.compute)(state))
    }
}
