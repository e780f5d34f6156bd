//! AuthStore MongoDB Backend
//!
//! MongoDB stores for the four OAuth entity kinds plus the database
//! accessor the stores acquire their handle through.

pub mod backend;
pub mod context;
pub mod indexes;
pub mod store;

pub use backend::MongoBackend;
pub use context::{MongoContext, NO_SUITABLE_DATABASE};
pub use indexes::ensure_indexes;
pub use store::{
    MongoApplicationStore, MongoAuthorizationStore, MongoScopeStore, MongoTokenStore,
};

use mongodb::Database;
use tokio_util::sync::CancellationToken;

/// Configuration for the MongoDB stores.
#[derive(Clone)]
pub struct MongoStoreOptions {
    /// Database handle; when unset, a `mongodb::Database` registered on
    /// the [`ServiceRegistry`](authstore_resolver::ServiceRegistry) is
    /// used as a fallback.
    pub database: Option<Database>,
    pub applications_collection: String,
    pub authorizations_collection: String,
    pub scopes_collection: String,
    pub tokens_collection: String,
    /// Signal aborting database-handle acquisition, typically tied to
    /// server shutdown.
    pub cancellation: CancellationToken,
}

impl Default for MongoStoreOptions {
    fn default() -> Self {
        Self {
            database: None,
            applications_collection: "applications".to_string(),
            authorizations_collection: "authorizations".to_string(),
            scopes_collection: "scopes".to_string(),
            tokens_collection: "tokens".to_string(),
            cancellation: CancellationToken::new(),
        }
    }
}

impl MongoStoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_collection_prefix(mut self, prefix: &str) -> Self {
        self.applications_collection = format!("{prefix}applications");
        self.authorizations_collection = format!("{prefix}authorizations");
        self.scopes_collection = format!("{prefix}scopes");
        self.tokens_collection = format!("{prefix}tokens");
        self
    }
}
