//! Store Type Cache
//!
//! Process-wide memo of the concrete store type derived for a requested
//! entity type. Entries are append-only and valid for the lifetime of
//! the process: the mapping is a pure function of static type
//! information, so staleness is impossible and there is no eviction.

use dashmap::DashMap;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use authstore_core::{EntityKind, Result};

use crate::registry::ServiceRegistry;

/// Identity of a concrete store type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTypeInfo {
    pub id: TypeId,
    pub name: &'static str,
}

impl StoreTypeInfo {
    pub fn of<S: 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: type_name::<S>(),
        }
    }
}

/// Builds a store instance against the registry. Instances are built on
/// every resolution; only the type decision is memoized.
pub type StoreFactory =
    Arc<dyn Fn(&ServiceRegistry) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

#[derive(Clone)]
pub struct ResolvedStoreType {
    /// Requested entity type name.
    pub entity: &'static str,
    /// Concrete store type chosen for the entity type.
    pub store: StoreTypeInfo,
    factory: StoreFactory,
}

impl ResolvedStoreType {
    pub fn new(entity: &'static str, store: StoreTypeInfo, factory: StoreFactory) -> Self {
        Self {
            entity,
            store,
            factory,
        }
    }

    pub fn instantiate(&self, registry: &ServiceRegistry) -> Result<Box<dyn Any + Send + Sync>> {
        (self.factory)(registry)
    }

    /// Whether two entries share the same factory allocation; used to
    /// observe that repeated resolutions reuse one cached decision.
    pub fn same_decision(&self, other: &Self) -> bool {
        self.store == other.store && Arc::ptr_eq(&self.factory, &other.factory)
    }
}

impl fmt::Debug for ResolvedStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStoreType")
            .field("entity", &self.entity)
            .field("store", &self.store.name)
            .finish()
    }
}

#[derive(Default)]
pub struct StoreTypeCache {
    entries: DashMap<(EntityKind, TypeId), ResolvedStoreType>,
}

impl StoreTypeCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, kind: EntityKind, entity: TypeId) -> Option<ResolvedStoreType> {
        self.entries.get(&(kind, entity)).map(|e| e.clone())
    }

    /// Returns the cached entry for the key, or computes one. A hit
    /// never invokes `compute`. On a miss the computation runs outside
    /// the map lock, so concurrent first-access may compute more than
    /// once; the first writer wins and every caller observes that
    /// entry. A failed computation is returned to the caller and never
    /// cached.
    pub fn get_or_try_insert<F>(
        &self,
        kind: EntityKind,
        entity: TypeId,
        compute: F,
    ) -> Result<ResolvedStoreType>
    where
        F: FnOnce() -> Result<ResolvedStoreType>,
    {
        if let Some(existing) = self.entries.get(&(kind, entity)) {
            return Ok(existing.clone());
        }

        let computed = compute()?;
        let entry = self.entries.entry((kind, entity)).or_insert(computed);
        Ok(entry.clone())
    }
}
