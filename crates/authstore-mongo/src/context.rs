//! Database Accessor
//!
//! Supplies the active MongoDB database handle to the stores: the
//! handle from [`MongoStoreOptions`] when configured, otherwise a
//! `mongodb::Database` registered on the service registry.

use std::sync::Arc;

use mongodb::Database;
use tokio_util::sync::CancellationToken;

use authstore_core::{Result, StoreError};
use authstore_resolver::ServiceRegistry;

use crate::MongoStoreOptions;

pub const NO_SUITABLE_DATABASE: &str = "no suitable MongoDB database was found; configure one \
     with MongoStoreOptions::with_database() or register a mongodb::Database on the \
     ServiceRegistry";

pub struct MongoContext {
    options: MongoStoreOptions,
    registry: Arc<ServiceRegistry>,
}

impl MongoContext {
    pub fn new(options: MongoStoreOptions, registry: Arc<ServiceRegistry>) -> Self {
        Self { options, registry }
    }

    pub fn options(&self) -> &MongoStoreOptions {
        &self.options
    }

    /// Returns the database handle. An already-triggered cancellation
    /// signal fails fast before any lookup is attempted.
    pub async fn database(&self, cancel: &CancellationToken) -> Result<Database> {
        if cancel.is_cancelled() {
            return Err(StoreError::Canceled);
        }
        if let Some(database) = &self.options.database {
            return Ok(database.clone());
        }
        self.registry
            .try_resolve::<Database>()
            .ok_or_else(|| StoreError::configuration(NO_SUITABLE_DATABASE))
    }
}
