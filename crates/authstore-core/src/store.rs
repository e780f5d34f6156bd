//! Store Traits
//!
//! CRUD-style persistence contracts implemented by each backend, one
//! extension trait per entity kind on top of the shared [`EntityStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::EntityDocument;
use crate::error::Result;

/// Operations shared by every entity kind.
#[async_trait]
pub trait EntityStore<T: EntityDocument>: Send + Sync {
    async fn count(&self) -> Result<u64>;

    async fn create(&self, entity: &T) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Replaces the stored entity with the same id.
    async fn update(&self, entity: &T) -> Result<()>;

    /// Returns whether an entity was actually removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<T>>;
}

#[async_trait]
pub trait ApplicationStore<T: EntityDocument>: EntityStore<T> {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<T>>;
}

#[async_trait]
pub trait AuthorizationStore<T: EntityDocument>: EntityStore<T> {
    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>>;

    async fn find_by_application(&self, application_id: &str) -> Result<Vec<T>>;

    /// Removes authorizations created before `before` that are no
    /// longer valid. Returns the number of removed entries.
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait ScopeStore<T: EntityDocument>: EntityStore<T> {
    async fn find_by_name(&self, name: &str) -> Result<Option<T>>;

    async fn find_by_names(&self, names: &[String]) -> Result<Vec<T>>;
}

impl<T: EntityDocument> std::fmt::Debug for dyn TokenStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn TokenStore")
    }
}

#[async_trait]
pub trait TokenStore<T: EntityDocument>: EntityStore<T> {
    async fn find_by_reference_id(&self, reference_id: &str) -> Result<Option<T>>;

    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>>;

    async fn find_by_authorization(&self, authorization_id: &str) -> Result<Vec<T>>;

    /// Removes tokens created before `before` that can no longer be
    /// used: non-valid status, or already past their expiry.
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64>;
}
