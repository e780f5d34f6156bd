//! Index Bootstrap
//!
//! Creates the indexes the kind-specific queries rely on. Index
//! creation is idempotent; run it once at startup.

use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use tracing::debug;

use authstore_core::{Result, StoreError};

use crate::MongoStoreOptions;

async fn create(database: &Database, collection: &str, model: IndexModel) -> Result<()> {
    database
        .collection::<Document>(collection)
        .create_index(model)
        .await
        .map_err(StoreError::database)?;
    Ok(())
}

fn unique(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn lookup(keys: Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

/// Unique sparse index: the field is optional but must be unique when
/// present (reference ids).
fn unique_sparse(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).sparse(true).build())
        .build()
}

pub async fn ensure_indexes(database: &Database, options: &MongoStoreOptions) -> Result<()> {
    let applications = options.applications_collection.as_str();
    create(database, applications, unique(doc! { "client_id": 1 })).await?;

    let authorizations = options.authorizations_collection.as_str();
    create(database, authorizations, lookup(doc! { "subject": 1 })).await?;
    create(database, authorizations, lookup(doc! { "application_id": 1 })).await?;

    let scopes = options.scopes_collection.as_str();
    create(database, scopes, unique(doc! { "name": 1 })).await?;

    let tokens = options.tokens_collection.as_str();
    create(database, tokens, unique_sparse(doc! { "reference_id": 1 })).await?;
    create(database, tokens, lookup(doc! { "subject": 1 })).await?;
    create(database, tokens, lookup(doc! { "authorization_id": 1 })).await?;

    debug!(database = database.name(), "ensured store indexes");
    Ok(())
}
