//! Store Resolver
//!
//! Picks a working store for a requested entity type. An explicitly
//! registered store always wins; otherwise the resolver derives a
//! backend store specialized for the entity type, memoizing the type
//! decision in the [`StoreTypeCache`] so repeated resolutions skip the
//! compatibility and context checks.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use tracing::debug;

use authstore_core::{
    ApplicationStore, AuthorizationStore, EntityDocument, EntityKind, Result, ScopeStore,
    StoreError, TokenStore,
};

use crate::cache::{ResolvedStoreType, StoreFactory, StoreTypeCache, StoreTypeInfo};
use crate::registry::{Lookup, ServiceRegistry};

/// Implemented by each persistence backend.
///
/// Store constructors resolve their database context from the registry
/// (`resolve_required`); those failures surface to the caller as-is.
pub trait StoreBackend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Verifies any externally configured context this backend needs
    /// before stores can be derived. Runs once per requested entity
    /// type, after the compatibility check.
    fn check_context(&self, kind: EntityKind, registry: &ServiceRegistry) -> Result<()>;

    fn application_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ApplicationStore<T>>>;

    fn authorization_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn AuthorizationStore<T>>>;

    fn scope_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ScopeStore<T>>>;

    fn token_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn TokenStore<T>>>;

    /// Identity of the concrete store type this backend derives for the
    /// entity type, recorded on the cache entry.
    fn resolved_store<T: EntityDocument>(&self, kind: EntityKind) -> StoreTypeInfo;
}

/// One resolver covers all four entity kinds; the public methods bind
/// the kind tag and the store trait, the resolution logic is shared.
pub struct StoreResolver<B: StoreBackend> {
    registry: Arc<ServiceRegistry>,
    backend: Arc<B>,
    cache: Arc<StoreTypeCache>,
}

impl<B: StoreBackend> StoreResolver<B> {
    pub fn new(registry: Arc<ServiceRegistry>, backend: Arc<B>) -> Self {
        Self::with_cache(registry, backend, Arc::new(StoreTypeCache::new()))
    }

    /// Shares an explicitly owned cache between resolvers.
    pub fn with_cache(
        registry: Arc<ServiceRegistry>,
        backend: Arc<B>,
        cache: Arc<StoreTypeCache>,
    ) -> Self {
        Self {
            registry,
            backend,
            cache,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<StoreTypeCache> {
        &self.cache
    }

    /// Resolves an application store for `T`. To override derivation,
    /// register an `Arc<dyn ApplicationStore<T>>` on the registry.
    pub fn applications<T: EntityDocument>(&self) -> Result<Arc<dyn ApplicationStore<T>>> {
        self.resolve::<T, dyn ApplicationStore<T>>(EntityKind::Application, |b, r| {
            b.application_store::<T>(r)
        })
    }

    pub fn authorizations<T: EntityDocument>(&self) -> Result<Arc<dyn AuthorizationStore<T>>> {
        self.resolve::<T, dyn AuthorizationStore<T>>(EntityKind::Authorization, |b, r| {
            b.authorization_store::<T>(r)
        })
    }

    pub fn scopes<T: EntityDocument>(&self) -> Result<Arc<dyn ScopeStore<T>>> {
        self.resolve::<T, dyn ScopeStore<T>>(EntityKind::Scope, |b, r| b.scope_store::<T>(r))
    }

    pub fn tokens<T: EntityDocument>(&self) -> Result<Arc<dyn TokenStore<T>>> {
        self.resolve::<T, dyn TokenStore<T>>(EntityKind::Token, |b, r| b.token_store::<T>(r))
    }

    fn resolve<T, S>(
        &self,
        kind: EntityKind,
        build: impl Fn(&B, &ServiceRegistry) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Result<Arc<S>>
    where
        T: EntityDocument,
        S: ?Sized + Send + Sync + 'static,
    {
        // An explicitly registered store wins; the registry owns its
        // lifetime and the cache is left untouched. An explicitly
        // absent registration falls through to derivation.
        if let Lookup::Found(store) = self.registry.lookup::<Arc<S>>() {
            return Ok(store);
        }

        let entry = self
            .cache
            .get_or_try_insert(kind, TypeId::of::<T>(), || self.derive::<T, S>(kind, build))?;

        // Types are memoized, instances are not: the factory builds a
        // fresh store handle on every resolution.
        let instance = entry.instantiate(&self.registry)?;
        instance
            .downcast::<Arc<S>>()
            .map(|store| *store)
            .map_err(|_| {
                StoreError::configuration(format!(
                    "the store resolved for '{}' has an unexpected type",
                    type_name::<T>()
                ))
            })
    }

    fn derive<T, S>(
        &self,
        kind: EntityKind,
        build: impl Fn(&B, &ServiceRegistry) -> Result<Arc<S>> + Send + Sync + 'static,
    ) -> Result<ResolvedStoreType>
    where
        T: EntityDocument,
        S: ?Sized + Send + Sync + 'static,
    {
        // Compatibility first, context second; the ordering is part of
        // the observable contract.
        if T::KIND != kind {
            return Err(StoreError::incompatible_entity(kind, type_name::<T>()));
        }
        self.backend.check_context(kind, &self.registry)?;

        let backend = Arc::clone(&self.backend);
        let factory: StoreFactory = Arc::new(move |registry| {
            build(&backend, registry).map(|store| Box::new(store) as Box<dyn Any + Send + Sync>)
        });

        let store = self.backend.resolved_store::<T>(kind);
        debug!(
            entity = type_name::<T>(),
            store = store.name,
            backend = self.backend.name(),
            "derived {kind} store type"
        );
        Ok(ResolvedStoreType::new(type_name::<T>(), store, factory))
    }
}
