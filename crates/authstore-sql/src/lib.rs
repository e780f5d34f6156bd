//! AuthStore SQL Backend
//!
//! Postgres stores for the four OAuth entity kinds. Entities persist as
//! a serialized JSON `document` column plus denormalized columns for
//! the fields the kind-specific queries filter on.

pub mod backend;
pub mod schema;
pub mod store;

pub use backend::{SqlBackend, MISSING_POOL};
pub use schema::init_schema;
pub use store::{SqlApplicationStore, SqlAuthorizationStore, SqlScopeStore, SqlTokenStore};

use sqlx::PgPool;

/// Configuration for the SQL stores. The pool is the externally
/// configured context the stores cannot run without.
#[derive(Clone)]
pub struct SqlStoreOptions {
    pub pool: Option<PgPool>,
    pub table_prefix: String,
}

impl Default for SqlStoreOptions {
    fn default() -> Self {
        Self {
            pool: None,
            table_prefix: "authstore_".to_string(),
        }
    }
}

impl SqlStoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn applications_table(&self) -> String {
        format!("{}applications", self.table_prefix)
    }

    pub fn authorizations_table(&self) -> String {
        format!("{}authorizations", self.table_prefix)
    }

    pub fn scopes_table(&self) -> String {
        format!("{}scopes", self.table_prefix)
    }

    pub fn tokens_table(&self) -> String {
        format!("{}tokens", self.table_prefix)
    }
}
