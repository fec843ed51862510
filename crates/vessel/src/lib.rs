//! # Vessel
//!
//! A reactive state store where mutations write, actions orchestrate, and
//! getters derive. A small publish/subscribe bus sits beside it.
//!
//! ## Core Concepts
//!
//! Vessel separates **writes** from **workflows**:
//! - Mutation = the only code that writes state, synchronously, by name
//! - Action = a workflow (possibly async) that ends in commits
//! - Getter = a value derived from state, recomputed on every read
//!
//! The key principle: **every state change is attributable to exactly one
//! named mutation.**
//!
//! ## Architecture
//!
//! ```text
//! caller
//!     │
//!     ▼ dispatch(name, payload)
//! Action ────────── sync: runs now ─────────┐
//!     │                                     │
//!     └─ async: first poll now, rest spawned┤
//!                                           ▼ commit(name, payload)
//!                                      Mutation(&mut state, payload)
//!                                           │
//!                                           ▼
//!                                     ReactiveCell ── version += 1
//!                                           │
//!                                           ├─► watchers (registration order)
//!                                           │
//!                                           └─► getters recompute on next read
//!
//! EventBus: on(channel, listener) / emit(channel, payload), independent of Store
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Mutations are the only writers**: actions and getters only read
//! 2. **Unknown names fail loudly**: `commit`/`dispatch` of an unregistered
//!    name returns a lookup error and changes nothing
//! 3. **Getters never cache**: a read after a commit sees the commit
//! 4. **Bus fan-out is ordered**: listeners run in registration order
//! 5. **No ordering across actions**: deferred commits from different
//!    actions may interleave either way
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use vessel_core::{EventBus, Store};
//!
//! #[derive(Debug, Default, Clone)]
//! struct Counter { count: i64 }
//!
//! let store: Store<Counter, i64> = Store::builder(Counter::default())
//!     .mutation("setCount", |s, n| s.count = n)
//!     .async_action_fn("increase", |ctx, _| async move {
//!         tokio::time::sleep(Duration::from_millis(300)).await;
//!         let next = ctx.state(|s| s.count) + 1;
//!         ctx.commit("setCount", next)?;
//!         Ok(())
//!     })
//!     .getter("doubled", |s| serde_json::json!(s.count * 2))
//!     .build();
//!
//! store.dispatch("increase", 0)?.await?;
//! assert_eq!(store.state(|s| s.count), 1);
//!
//! let bus = EventBus::<String>::new();
//! bus.on("greet", |name| { println!("hello {name}"); Ok(()) });
//! bus.emit("greet", &"world".to_string())?;
//! ```
//!
//! ## What This Is Not
//!
//! Vessel does **not** do persistence, time travel, hot reload, strict-mode
//! write guarding, or namespaced sub-stores.

// Core modules
mod action;
mod bus;
mod dispatch;
mod error;
mod getters;
mod install;
mod reactive;
mod store;



// Re-export store types
pub use store::{Store, StoreBuilder};

// Re-export action types
pub use action::{Action, ActionContext, AsyncFnAction};

// Re-export dispatch handle
pub use dispatch::Dispatched;

// Re-export getter types
pub use getters::{Derived, Getters};

// Re-export reactive cell types
pub use reactive::{ReactiveCell, StateChange, Subscription};

// Re-export bus types
pub use bus::{BusConfig, EventBus, FailurePolicy, Listener};

// Re-export host integration types
pub use install::{
    install, AppContext, BeforeCreate, Component, ComponentOptions, Host, Plugin, Prototype,
    StorePlugin,
};

// Re-export error types
pub use error::{BusError, ListenerFailure, StoreError};

// Re-export commonly used external types
pub use async_trait::async_trait;
