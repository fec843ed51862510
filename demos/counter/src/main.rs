//! # Counter Demo
//!
//! A parent component owns the store, a child reaches it through the host,
//! and the two talk over the shared bus.
//!
//! Run with `RUST_LOG=vessel_core=debug` to see every commit.

use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use vessel_core::{ActionContext, ComponentOptions, EventBus, Host, Store, StorePlugin};

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Counter {
    count: i64,
}

const DELAY: Duration = Duration::from_millis(300);

// ============================================================================
// Store (mutations write, actions schedule)
// ============================================================================

fn adjust_later(ctx: &ActionContext<Counter, i64>, delta: i64) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(DELAY).await;
        let next = ctx.state(|s| s.count) + delta;
        if let Err(e) = ctx.commit("setCount", next) {
            tracing::error!(error = %e, "deferred commit failed");
        }
    });
}

fn build_store() -> Store<Counter, i64> {
    Store::builder(Counter::default())
        .mutation("setCount", |state: &mut Counter, count| state.count = count)
        .action("increase", |ctx, _| {
            adjust_later(ctx, 1);
            Ok(())
        })
        .action("decrease", |ctx, _| {
            adjust_later(ctx, -1);
            Ok(())
        })
        .getter("doubled", |state| json!(state.count * 2))
        .build()
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut host: Host<Counter, i64> = Host::new();
    host.use_plugin(&StorePlugin);
    host.provide_bus(EventBus::new());

    let father =
        host.create_component(ComponentOptions::new("Father").with_store(build_store()));
    let child = host.create_component(ComponentOptions::new("Child"));

    let bus = father
        .bus()
        .ok_or_else(|| anyhow::anyhow!("host has no bus"))?;
    bus.on("greet", |payload: &Value| {
        println!("Father heard: {payload}");
        Ok(())
    });

    let store = child
        .store()
        .ok_or_else(|| anyhow::anyhow!("no store bound to host"))?;
    let _watch = {
        let reader = store.clone();
        store.watch(move |change| {
            println!(
                "v{} {:?}: count = {}",
                change.version,
                change.mutation,
                reader.state(|s| s.count)
            );
        })
    };

    if let Some(bus) = child.bus() {
        bus.emit("greet", &json!({ "from": child.name() }))?;
    }

    store.dispatch("increase", 0)?;
    store.dispatch("increase", 0)?;
    println!("right after dispatch: count = {}", store.state(|s| s.count));

    tokio::time::sleep(DELAY * 2).await;
    store.dispatch("decrease", 0)?;
    tokio::time::sleep(DELAY * 2).await;

    let doubled = match store.getters() {
        Some(getters) => getters.get("doubled")?,
        None => Value::Null,
    };
    println!("final: count = {}, doubled = {}", store.state(|s| s.count), doubled);

    Ok(())
}
