//! SQL Store Backend
//!
//! Plugs the SQL stores into the resolver. Unlike the MongoDB backend,
//! the SQL stores cannot be derived without an externally configured
//! connection pool; that requirement is surfaced during resolution.

use std::sync::Arc;

use sqlx::PgPool;

use authstore_core::{
    ApplicationStore, AuthorizationStore, EntityDocument, EntityKind, Result, ScopeStore,
    StoreError, TokenStore,
};
use authstore_resolver::{ServiceRegistry, StoreBackend, StoreResolver, StoreTypeInfo};

use crate::store::{SqlApplicationStore, SqlAuthorizationStore, SqlScopeStore, SqlTokenStore};
use crate::SqlStoreOptions;

pub const MISSING_POOL: &str = "no SQL connection pool has been configured for the SQL \
     stores; call SqlStoreOptions::with_pool() and register the options before resolving \
     stores";

pub struct SqlBackend;

impl SqlBackend {
    /// Registers the options and returns a resolver backed by this
    /// backend.
    pub fn setup(
        registry: Arc<ServiceRegistry>,
        options: SqlStoreOptions,
    ) -> StoreResolver<SqlBackend> {
        registry.register(options);
        StoreResolver::new(registry, Arc::new(SqlBackend))
    }

    fn pool(registry: &ServiceRegistry) -> Result<(PgPool, SqlStoreOptions)> {
        let options = registry.resolve_required::<SqlStoreOptions>()?;
        let pool = options
            .pool
            .clone()
            .ok_or_else(|| StoreError::configuration(MISSING_POOL))?;
        Ok((pool, options))
    }
}

impl StoreBackend for SqlBackend {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn check_context(&self, _kind: EntityKind, registry: &ServiceRegistry) -> Result<()> {
        let configured = registry
            .try_resolve::<SqlStoreOptions>()
            .is_some_and(|options| options.pool.is_some());
        if !configured {
            return Err(StoreError::configuration(MISSING_POOL));
        }
        Ok(())
    }

    fn application_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ApplicationStore<T>>> {
        let (pool, options) = Self::pool(registry)?;
        Ok(Arc::new(SqlApplicationStore::new(
            pool,
            options.applications_table(),
        )))
    }

    fn authorization_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn AuthorizationStore<T>>> {
        let (pool, options) = Self::pool(registry)?;
        Ok(Arc::new(SqlAuthorizationStore::new(
            pool,
            options.authorizations_table(),
        )))
    }

    fn scope_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn ScopeStore<T>>> {
        let (pool, options) = Self::pool(registry)?;
        Ok(Arc::new(SqlScopeStore::new(pool, options.scopes_table())))
    }

    fn token_store<T: EntityDocument>(
        &self,
        registry: &ServiceRegistry,
    ) -> Result<Arc<dyn TokenStore<T>>> {
        let (pool, options) = Self::pool(registry)?;
        Ok(Arc::new(SqlTokenStore::new(pool, options.tokens_table())))
    }

    fn resolved_store<T: EntityDocument>(&self, kind: EntityKind) -> StoreTypeInfo {
        match kind {
            EntityKind::Application => StoreTypeInfo::of::<SqlApplicationStore<T>>(),
            EntityKind::Authorization => StoreTypeInfo::of::<SqlAuthorizationStore<T>>(),
            EntityKind::Scope => StoreTypeInfo::of::<SqlScopeStore<T>>(),
            EntityKind::Token => StoreTypeInfo::of::<SqlTokenStore<T>>(),
        }
    }
}
