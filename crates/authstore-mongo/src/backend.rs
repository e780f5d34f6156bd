//! MongoDB Store Backend
//!
//! Plugs the MongoDB stores into the resolver. Derived stores resolve
//! the shared [`MongoContext`] from the registry; a missing context
//! registration surfaces as the registry's own configuration error.

use std::sync::Arc;

use authstore_core::{
    ApplicationStore, AuthorizationStore, EntityDocument, EntityKind, Result, ScopeStore,
    TokenStore,
};
use authstore_resolver::{ServiceRegistry, StoreBackend, StoreResolver, StoreTypeInfo};

use crate::context::MongoContext;
use crate::store::{
    MongoApplicationStore, MongoAuthorizationStore, MongoScopeStore, MongoTokenStore,
};
use crate::MongoStoreOptions;

pub struct MongoBackend;

impl MongoBackend {
    /// Registers a [`MongoContext`] built from `options` and returns a
    /// resolver backed by this backend.
    pub fn setup(
        registry: Arc<ServiceRegistry>,
        options: MongoStoreOptions,
    ) -> StoreResolver<MongoBackend> {
        let context = Arc::new(MongoContext::new(options, Arc::clone(&registry)));
        registry.register(context);
        StoreResolver::new(registry, Arc::new(MongoBackend))
    }

    fn context(registry: &ServiceRegistry) -> Result<Arc<MongoContext>> {
        registry.resolve_required::<Arc<MongoContext>>()
    }
}

impl StoreBackend for MongoBackend {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    /// The MongoDB stores have no configuration beyond the database
    /// handle, and handle acquisition reports its own error at use
    /// time.
    fn check_context(&self, _kind: EntityKind, _registry: &ServiceRegistry) -> Result<()> {
        Ok(())
    }

    fn application_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ApplicationStore<T>>> {
        Ok(Arc::new(MongoApplicationStore::new(Self::context(
            registry,
        )?)))
    }

    fn authorization_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn AuthorizationStore<T>>> {
        Ok(Arc::new(MongoAuthorizationStore::new(Self::context(
            registry,
        )?)))
    }

    fn scope_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ScopeStore<T>>> {
        Ok(Arc::new(MongoScopeStore::new(Self::context(registry)?)))
    }

    fn token_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn TokenStore<T>>> {
        Ok(Arc::new(MongoTokenStore::new(Self::context(registry)?)))
    }

    fn resolved_store<T: EntityDocument>(&self, kind: EntityKind) -> StoreTypeInfo {
        match kind {
            EntityKind::Application => StoreTypeInfo::of::<MongoApplicationStore<T>>(),
            EntityKind::Authorization => StoreTypeInfo::of::<MongoAuthorizationStore<T>>(),
            EntityKind::Scope => StoreTypeInfo::of::<MongoScopeStore<T>>(),
            EntityKind::Token => StoreTypeInfo::of::<MongoTokenStore<T>>(),
        }
    }
}
