//! Host integration.
//!
//! [`Host`] is the component framework seen from the store's side: it owns a
//! shared [`Prototype`] slot every component resolves `store`/`bus` through,
//! and runs before-create hooks for each component it instantiates.
//! [`install`] registers the hook that binds a component's declared store to
//! that slot. The binding is last-writer-wins.
//!
//! Components that can take their dependencies explicitly should use
//! [`AppContext`] instead.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use crate::bus::EventBus;
use crate::store::Store;

/// Properties every component inherits from the host.
pub struct Prototype<S, P = Value> {
    pub store: Option<Store<S, P>>,
    pub bus: Option<EventBus>,
}

impl<S, P> Default for Prototype<S, P> {
    fn default() -> Self {
        Self {
            store: None,
            bus: None,
        }
    }
}

/// What a component declares when it is created.
pub struct ComponentOptions<S, P = Value> {
    pub name: String,
    pub store: Option<Store<S, P>>,
}

impl<S, P> ComponentOptions<S, P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Store<S, P>) -> Self {
        self.store = Some(store);
        self
    }
}

/// Runs before a component is created.
pub type BeforeCreate<S, P> =
    Box<dyn Fn(&ComponentOptions<S, P>, &mut Prototype<S, P>) + Send + Sync>;

/// Something [`Host::use_plugin`] can install.
pub trait Plugin<S, P> {
    fn install(&self, host: &mut Host<S, P>);
}

/// The component framework.
pub struct Host<S, P = Value> {
    prototype: Arc<RwLock<Prototype<S, P>>>,
    before_create: Vec<BeforeCreate<S, P>>,
    installed: HashSet<TypeId>,
}

impl<S, P> Default for Host<S, P> {
    fn default() -> Self {
        Self {
            prototype: Arc::new(RwLock::new(Prototype::default())),
            before_create: Vec::new(),
            installed: HashSet::new(),
        }
    }
}

impl<S, P> Host<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `plugin` once. Installing the same plugin type again is a
    /// no-op.
    pub fn use_plugin<T>(&mut self, plugin: &T) -> &mut Self
    where
        T: Plugin<S, P> + 'static,
    {
        if self.installed.insert(TypeId::of::<T>()) {
            plugin.install(self);
        } else {
            debug!(plugin = std::any::type_name::<T>(), "plugin already installed");
        }
        self
    }

    /// Register a hook run at the start of every `create_component`.
    pub fn mixin_before_create<F>(&mut self, hook: F)
    where
        F: Fn(&ComponentOptions<S, P>, &mut Prototype<S, P>) + Send + Sync + 'static,
    {
        self.before_create.push(Box::new(hook));
    }

    /// Attach the shared bus every component reaches through [`Component::bus`].
    pub fn provide_bus(&self, bus: EventBus) {
        self.prototype
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .bus = Some(bus);
    }

    /// Run the before-create hooks, then hand back the component.
    pub fn create_component(&self, options: ComponentOptions<S, P>) -> Component<S, P> {
        {
            let mut prototype = self
                .prototype
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for hook in &self.before_create {
                hook(&options, &mut prototype);
            }
        }
        debug!(component = %options.name, "component created");
        Component {
            name: options.name,
            prototype: Arc::clone(&self.prototype),
        }
    }
}

/// A component instance. Store and bus are looked up on the shared prototype
/// at access time, so a later binding is visible to earlier components too.
pub struct Component<S, P = Value> {
    name: String,
    prototype: Arc<RwLock<Prototype<S, P>>>,
}

impl<S, P> Component<S, P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> Option<Store<S, P>> {
        self.prototype
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .store
            .clone()
    }

    pub fn bus(&self) -> Option<EventBus> {
        self.prototype
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bus
            .clone()
    }
}

/// Register the store-binding hook on `host`.
///
/// When a component declares a store, that store becomes the one every
/// component resolves, replacing any earlier binding.
pub fn install<S, P>(host: &mut Host<S, P>)
where
    S: Send + Sync + 'static,
    P: Send + 'static,
{
    host.mixin_before_create(|options, prototype| {
        let Some(store) = &options.store else {
            return;
        };
        let previous = prototype.store.as_ref().map(Store::id);
        info!(
            component = %options.name,
            store = %store.id(),
            previous = ?previous,
            "binding store to host"
        );
        prototype.store = Some(store.clone());
    });
}

/// Plugin form of [`install`], for [`Host::use_plugin`].
pub struct StorePlugin;

impl<S, P> Plugin<S, P> for StorePlugin
where
    S: Send + Sync + 'static,
    P: Send + 'static,
{
    fn install(&self, host: &mut Host<S, P>) {
        install(host);
    }
}

/// Explicit dependencies for components that take them at construction.
pub struct AppContext<S, P = Value> {
    store: Store<S, P>,
    bus: EventBus,
}

impl<S, P> Clone for AppContext<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<S, P> AppContext<S, P> {
    pub fn new(store: Store<S, P>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &Store<S, P> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store(start: i64) -> Store<i64> {
        Store::builder(start)
            .mutation("set", |s: &mut i64, v: Value| {
                *s = v.as_i64().unwrap_or_default()
            })
            .build()
    }

    #[test]
    fn declared_store_reaches_every_component() {
        let mut host = Host::<i64>::new();
        host.use_plugin(&StorePlugin);
        let root_store = store(0);

        let plain_before = host.create_component(ComponentOptions::new("early"));
        assert!(plain_before.store().is_none());

        let _root =
            host.create_component(ComponentOptions::new("root").with_store(root_store.clone()));
        let child = host.create_component(ComponentOptions::new("child"));

        let resolved = child.store().unwrap();
        assert_eq!(resolved.id(), root_store.id());
        resolved.commit("set", json!(4)).unwrap();
        assert_eq!(root_store.state(|s| *s), 4);

        // Lookup happens at access time.
        assert_eq!(plain_before.store().unwrap().id(), root_store.id());
    }

    #[test]
    fn last_declared_store_wins() {
        let mut host = Host::<i64>::new();
        install(&mut host);
        let first = store(1);
        let second = store(2);

        let a = host.create_component(ComponentOptions::new("a").with_store(first));
        let _b = host.create_component(ComponentOptions::new("b").with_store(second.clone()));

        assert_eq!(a.store().unwrap().id(), second.id());
        assert_eq!(a.name(), "a");
    }

    #[test]
    fn plugin_installs_once() {
        struct Counting(Arc<AtomicUsize>);
        impl Plugin<i64, Value> for Counting {
            fn install(&self, host: &mut Host<i64, Value>) {
                self.0.fetch_add(1, Ordering::SeqCst);
                install(host);
            }
        }

        let installs = Arc::new(AtomicUsize::new(0));
        let mut host = Host::<i64>::new();
        let plugin = Counting(installs.clone());
        host.use_plugin(&plugin).use_plugin(&plugin);
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert_eq!(host.before_create.len(), 1);
    }

    #[test]
    fn shared_bus_is_one_instance() {
        let host = Host::<i64>::new();
        host.provide_bus(EventBus::new());
        let a = host.create_component(ComponentOptions::new("a"));
        let b = host.create_component(ComponentOptions::new("b"));

        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            a.bus().unwrap().on("ping", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        b.bus().unwrap().emit("ping", &json!(null)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn app_context_threads_dependencies_explicitly() {
        let ctx = AppContext::new(store(3), EventBus::new());
        let copy = ctx.clone();
        copy.store().commit("set", json!(8)).unwrap();
        assert_eq!(ctx.store().state(|s| *s), 8);
        assert_eq!(copy.bus().listener_count("anything"), 0);
    }
}
