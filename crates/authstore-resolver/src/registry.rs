//! Service Registry
//!
//! Type-keyed registry standing in for a dependency container. Values
//! are registered and resolved by their Rust type; an explicit "absent"
//! registration is distinguishable from a type that was never
//! registered at all.

use dashmap::DashMap;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use authstore_core::{Result, StoreError};

enum Slot {
    Absent,
    Value(Arc<dyn Any + Send + Sync>),
}

/// Outcome of a non-failing registry probe.
pub enum Lookup<V> {
    Found(V),
    /// A slot exists but was explicitly registered as absent.
    Absent,
    Unregistered,
}

impl<V> Lookup<V> {
    pub fn found(self) -> Option<V> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

#[derive(Default)]
pub struct ServiceRegistry {
    entries: DashMap<TypeId, Slot>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Registers `value` under its own type, replacing any previous
    /// registration for that type.
    pub fn register<V: Clone + Send + Sync + 'static>(&self, value: V) {
        self.entries
            .insert(TypeId::of::<V>(), Slot::Value(Arc::new(value)));
    }

    /// Registers the type as explicitly absent.
    pub fn register_absent<V: 'static>(&self) {
        self.entries.insert(TypeId::of::<V>(), Slot::Absent);
    }

    pub fn lookup<V: Clone + Send + Sync + 'static>(&self) -> Lookup<V> {
        match self.entries.get(&TypeId::of::<V>()) {
            None => Lookup::Unregistered,
            Some(slot) => match slot.value() {
                Slot::Absent => Lookup::Absent,
                Slot::Value(any) => match any.downcast_ref::<V>() {
                    Some(value) => Lookup::Found(value.clone()),
                    // Slots are keyed by the value's own TypeId.
                    None => Lookup::Unregistered,
                },
            },
        }
    }

    pub fn try_resolve<V: Clone + Send + Sync + 'static>(&self) -> Option<V> {
        self.lookup::<V>().found()
    }

    /// Resolves a registration that must exist; failure is a fatal
    /// configuration error naming the missing type.
    pub fn resolve_required<V: Clone + Send + Sync + 'static>(&self) -> Result<V> {
        match self.lookup::<V>() {
            Lookup::Found(value) => Ok(value),
            Lookup::Absent => Err(StoreError::absent_service(type_name::<V>())),
            Lookup::Unregistered => Err(StoreError::unregistered_service(type_name::<V>())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    struct Config {
        url: String,
    }

    #[test]
    fn register_and_resolve() {
        let registry = ServiceRegistry::new();
        registry.register(Config {
            url: "mongodb://localhost".into(),
        });

        let found = registry.try_resolve::<Config>().unwrap();
        assert_eq!(found.url, "mongodb://localhost");
        assert!(registry.lookup::<Config>().is_found());
    }

    #[test]
    fn unregistered_type_is_distinct_from_absent() {
        let registry = ServiceRegistry::new();
        assert!(matches!(registry.lookup::<Config>(), Lookup::Unregistered));

        registry.register_absent::<Config>();
        assert!(matches!(registry.lookup::<Config>(), Lookup::Absent));
        assert!(registry.try_resolve::<Config>().is_none());
    }

    #[test]
    fn resolve_required_messages_differ() {
        let registry = ServiceRegistry::new();
        let unregistered = registry.resolve_required::<Config>().unwrap_err();

        registry.register_absent::<Config>();
        let absent = registry.resolve_required::<Config>().unwrap_err();

        assert_ne!(unregistered.to_string(), absent.to_string());
        assert!(unregistered.to_string().contains("Config"));
        assert!(absent.to_string().contains("explicitly registered as absent"));
    }

    #[test]
    fn registration_replaces_previous_value() {
        let registry = ServiceRegistry::new();
        registry.register(Config { url: "a".into() });
        registry.register(Config { url: "b".into() });
        assert_eq!(registry.try_resolve::<Config>().unwrap().url, "b");

        registry.register_absent::<Config>();
        assert!(matches!(registry.lookup::<Config>(), Lookup::Absent));
    }

    #[test]
    fn trait_object_values_resolve_by_their_arc_type() {
        trait Greeter: Send + Sync {
            fn hello(&self) -> &'static str;
        }
        struct English;
        impl Greeter for English {
            fn hello(&self) -> &'static str {
                "hello"
            }
        }

        let registry = ServiceRegistry::new();
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        registry.register(greeter.clone());

        let resolved = registry.resolve_required::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(resolved.hello(), "hello");
        assert!(Arc::ptr_eq(&resolved, &greeter));
    }
}
