//! Store Resolver Integration Tests
//!
//! Exercises resolution against an in-memory backend: direct
//! registrations, derivation and caching, compatibility and context
//! failures, and concurrent first access.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use authstore_core::{
    Application, ApplicationStore, AuthorizationStore, EntityDocument, EntityKind, EntityStore,
    Result, Scope, ScopeStore, StoreError, Token, TokenStore,
};
use authstore_resolver::{ServiceRegistry, StoreBackend, StoreResolver, StoreTypeInfo};

// ----------------------------------------------------------------------------
// In-memory stores
// ----------------------------------------------------------------------------

struct MemoryStore<T> {
    items: Mutex<HashMap<String, T>>,
}

impl<T: EntityDocument> MemoryStore<T> {
    fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }

    fn field_matches(entity: &T, field: &str, value: &str) -> bool {
        serde_json::to_value(entity)
            .ok()
            .and_then(|v| v.get(field).and_then(|f| f.as_str().map(|s| s == value)))
            .unwrap_or(false)
    }

    fn find_where(&self, field: &str, value: &str) -> Vec<T> {
        self.items
            .lock()
            .unwrap()
            .values()
            .filter(|e| Self::field_matches(e, field, value))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl<T: EntityDocument> EntityStore<T> for MemoryStore<T> {
    async fn count(&self) -> Result<u64> {
        Ok(self.items.lock().unwrap().len() as u64)
    }

    async fn create(&self, entity: &T) -> Result<()> {
        self.items
            .lock()
            .unwrap()
            .insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        Ok(self.items.lock().unwrap().get(id).cloned())
    }

    async fn update(&self, entity: &T) -> Result<()> {
        self.items
            .lock()
            .unwrap()
            .insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.items.lock().unwrap().remove(id).is_some())
    }

    async fn list(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<T>> {
        let items = self.items.lock().unwrap();
        let mut all: Vec<T> = items.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        let skipped = all.into_iter().skip(offset.unwrap_or(0) as usize);
        Ok(match limit {
            Some(n) => skipped.take(n as usize).collect(),
            None => skipped.collect(),
        })
    }
}

#[async_trait]
impl<T: EntityDocument> ApplicationStore<T> for MemoryStore<T> {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<T>> {
        Ok(self.find_where("client_id", client_id).into_iter().next())
    }
}

#[async_trait]
impl<T: EntityDocument> AuthorizationStore<T> for MemoryStore<T> {
    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>> {
        Ok(self.find_where("subject", subject))
    }

    async fn find_by_application(&self, application_id: &str) -> Result<Vec<T>> {
        Ok(self.find_where("application_id", application_id))
    }

    async fn prune(&self, _before: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

#[async_trait]
impl<T: EntityDocument> ScopeStore<T> for MemoryStore<T> {
    async fn find_by_name(&self, name: &str) -> Result<Option<T>> {
        Ok(self.find_where("name", name).into_iter().next())
    }

    async fn find_by_names(&self, names: &[String]) -> Result<Vec<T>> {
        let mut found = Vec::new();
        for name in names {
            found.extend(self.find_where("name", name));
        }
        Ok(found)
    }
}

#[async_trait]
impl<T: EntityDocument> TokenStore<T> for MemoryStore<T> {
    async fn find_by_reference_id(&self, reference_id: &str) -> Result<Option<T>> {
        Ok(self
            .find_where("reference_id", reference_id)
            .into_iter()
            .next())
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>> {
        Ok(self.find_where("subject", subject))
    }

    async fn find_by_authorization(&self, authorization_id: &str) -> Result<Vec<T>> {
        Ok(self.find_where("authorization_id", authorization_id))
    }

    async fn prune(&self, _before: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

// ----------------------------------------------------------------------------
// Test backends
// ----------------------------------------------------------------------------

/// Backend with no external context requirement.
struct MemoryBackend;

struct MemoryStoreType<T>(PhantomData<T>);

impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn check_context(&self, _kind: EntityKind, _registry: &ServiceRegistry) -> Result<()> {
        Ok(())
    }

    fn application_store<T: EntityDocument>(
        &self,
        _registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ApplicationStore<T>>> {
        Ok(Arc::new(MemoryStore::new()))
    }

    fn authorization_store<T: EntityDocument>(
        &self,
        _registry: &ServiceRegistry,
    ) -> Result<Arc<dyn AuthorizationStore<T>>> {
        Ok(Arc::new(MemoryStore::new()))
    }

    fn scope_store<T: EntityDocument>(
        &self,
        _registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ScopeStore<T>>> {
        Ok(Arc::new(MemoryStore::new()))
    }

    fn token_store<T: EntityDocument>(
        &self,
        _registry: &ServiceRegistry,
    ) -> Result<Arc<dyn TokenStore<T>>> {
        Ok(Arc::new(MemoryStore::new()))
    }

    fn resolved_store<T: EntityDocument>(&self, _kind: EntityKind) -> StoreTypeInfo {
        StoreTypeInfo::of::<MemoryStoreType<T>>()
    }
}

const MISSING_CONTEXT: &str = "no connection has been configured for the context backend";

/// Marker the context-requiring backend looks for on the registry.
#[derive(Clone)]
struct ContextHandle;

/// Backend that requires an externally configured context, like the
/// SQL backend requires a pool.
struct ContextBackend;

impl ContextBackend {
    fn store<T: EntityDocument>(registry: &ServiceRegistry) -> Result<Arc<MemoryStore<T>>> {
        registry.resolve_required::<ContextHandle>()?;
        Ok(Arc::new(MemoryStore::new()))
    }
}

impl StoreBackend for ContextBackend {
    fn name(&self) -> &'static str {
        "context"
    }

    fn check_context(&self, _kind: EntityKind, registry: &ServiceRegistry) -> Result<()> {
        if registry.try_resolve::<ContextHandle>().is_none() {
            return Err(StoreError::configuration(MISSING_CONTEXT));
        }
        Ok(())
    }

    fn application_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ApplicationStore<T>>> {
        Ok(Self::store::<T>(registry)?)
    }

    fn authorization_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn AuthorizationStore<T>>> {
        Ok(Self::store::<T>(registry)?)
    }

    fn scope_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ScopeStore<T>>> {
        Ok(Self::store::<T>(registry)?)
    }

    fn token_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn TokenStore<T>>> {
        Ok(Self::store::<T>(registry)?)
    }

    fn resolved_store<T: EntityDocument>(&self, _kind: EntityKind) -> StoreTypeInfo {
        StoreTypeInfo::of::<MemoryStoreType<T>>()
    }
}

/// A custom token type compatible with the token kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomToken {
    #[serde(rename = "_id")]
    id: String,
    reference_id: Option<String>,
    tenant: String,
}

impl EntityDocument for CustomToken {
    const KIND: EntityKind = EntityKind::Token;

    fn id(&self) -> &str {
        &self.id
    }
}

fn memory_resolver() -> StoreResolver<MemoryBackend> {
    StoreResolver::new(Arc::new(ServiceRegistry::new()), Arc::new(MemoryBackend))
}

// ----------------------------------------------------------------------------
// Resolution
// ----------------------------------------------------------------------------

#[tokio::test]
async fn derived_store_round_trips_entities() {
    let resolver = memory_resolver();
    let store = resolver.tokens::<Token>().unwrap();

    let token = Token::new()
        .with_subject("user-1")
        .with_reference_id("ref-1");
    store.create(&token).await.unwrap();

    let found = store.find_by_reference_id("ref-1").await.unwrap().unwrap();
    assert_eq!(found.id, token.id);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[test]
fn resolution_is_idempotent_per_requested_type() {
    let resolver = memory_resolver();

    resolver.tokens::<Token>().unwrap();
    resolver.tokens::<Token>().unwrap();
    assert_eq!(resolver.cache().len(), 1);

    let entry = resolver
        .cache()
        .get(EntityKind::Token, TypeId::of::<Token>())
        .unwrap();
    let again = resolver
        .cache()
        .get(EntityKind::Token, TypeId::of::<Token>())
        .unwrap();
    assert!(entry.same_decision(&again));

    // A distinct requested type gets its own entry.
    resolver.tokens::<CustomToken>().unwrap();
    assert_eq!(resolver.cache().len(), 2);
}

#[test]
fn each_kind_resolves_its_builtin_entity() {
    let resolver = memory_resolver();
    resolver.applications::<Application>().unwrap();
    resolver.authorizations::<authstore_core::Authorization>().unwrap();
    resolver.scopes::<Scope>().unwrap();
    resolver.tokens::<Token>().unwrap();
    assert_eq!(resolver.cache().len(), 4);
}

#[test]
fn incompatible_entity_type_fails_on_every_call() {
    let resolver = memory_resolver();
    let expected = StoreError::incompatible_entity(
        EntityKind::Token,
        std::any::type_name::<Scope>(),
    )
    .to_string();

    for _ in 0..2 {
        let err = resolver.tokens::<Scope>().unwrap_err();
        assert_eq!(err.to_string(), expected);
    }
    // Failures are never cached.
    assert!(resolver.cache().is_empty());
}

#[test]
fn registered_store_bypasses_derivation_and_cache() {
    let registry = Arc::new(ServiceRegistry::new());
    let custom: Arc<dyn TokenStore<CustomToken>> = Arc::new(MemoryStore::new());
    registry.register(custom.clone());

    let resolver = StoreResolver::with_cache(
        registry,
        Arc::new(MemoryBackend),
        Arc::new(authstore_resolver::StoreTypeCache::new()),
    );

    let resolved = resolver.tokens::<CustomToken>().unwrap();
    assert!(Arc::ptr_eq(&resolved, &custom));
    assert!(resolver.cache().is_empty());
}

#[test]
fn absent_store_registration_falls_through_to_derivation() {
    let registry = Arc::new(ServiceRegistry::new());
    registry.register_absent::<Arc<dyn TokenStore<Token>>>();

    let resolver = StoreResolver::new(registry, Arc::new(MemoryBackend));
    resolver.tokens::<Token>().unwrap();
    assert_eq!(resolver.cache().len(), 1);
}

#[test]
fn derived_instances_are_fresh_but_share_one_type_decision() {
    let resolver = memory_resolver();
    let first = resolver.tokens::<Token>().unwrap();
    let second = resolver.tokens::<Token>().unwrap();

    // The registry owns instance lifetime; derivation builds per call.
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(resolver.cache().len(), 1);
}

// ----------------------------------------------------------------------------
// Context requirement
// ----------------------------------------------------------------------------

#[test]
fn missing_context_fails_for_compatible_type() {
    let resolver = StoreResolver::new(Arc::new(ServiceRegistry::new()), Arc::new(ContextBackend));

    let err = resolver.tokens::<Token>().unwrap_err();
    assert_eq!(err.to_string(), format!("Configuration error: {MISSING_CONTEXT}"));
    assert!(resolver.cache().is_empty());
}

#[test]
fn compatibility_is_checked_before_context() {
    // Context unset AND the type is incompatible: the incompatible
    // error wins, pinning the check order.
    let resolver = StoreResolver::new(Arc::new(ServiceRegistry::new()), Arc::new(ContextBackend));

    let err = resolver.tokens::<Scope>().unwrap_err();
    assert!(err.to_string().contains("is not compatible"));
}

#[test]
fn context_configured_after_failure_recovers() {
    let registry = Arc::new(ServiceRegistry::new());
    let resolver = StoreResolver::new(Arc::clone(&registry), Arc::new(ContextBackend));

    resolver.tokens::<Token>().unwrap_err();
    registry.register(ContextHandle);
    resolver.tokens::<Token>().unwrap();
    assert_eq!(resolver.cache().len(), 1);
}

// ----------------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------------

#[test]
fn concurrent_resolution_converges() {
    let resolver = Arc::new(memory_resolver());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || resolver.tokens::<Token>().map(|_| ()))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(resolver.cache().len(), 1);
}
