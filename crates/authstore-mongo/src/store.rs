//! MongoDB Entity Stores
//!
//! One store per entity kind, generic over the entity type. Each
//! operation acquires the database handle through the shared
//! [`MongoContext`], so a handle configured or swapped at runtime is
//! picked up without rebuilding stores.
//!
//! Kind-specific queries address the built-in serde field names
//! (`client_id`, `subject`, `reference_id`, ...); custom entity types
//! must keep those names.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use tokio_util::sync::CancellationToken;
use tracing::info;

use authstore_core::{
    ApplicationStore, AuthorizationStore, EntityDocument, EntityStore, Result, ScopeStore,
    StoreError, TokenStore,
};

use crate::context::MongoContext;

macro_rules! mongo_store {
    ($name:ident, $collection_field:ident) => {
        pub struct $name<T: EntityDocument> {
            context: Arc<MongoContext>,
            collection: String,
            cancellation: CancellationToken,
            _entity: PhantomData<fn() -> T>,
        }

        impl<T: EntityDocument> $name<T> {
            pub fn new(context: Arc<MongoContext>) -> Self {
                let collection = context.options().$collection_field.clone();
                let cancellation = context.options().cancellation.clone();
                Self {
                    context,
                    collection,
                    cancellation,
                    _entity: PhantomData,
                }
            }

            async fn collection(&self) -> Result<Collection<T>> {
                let database = self.context.database(&self.cancellation).await?;
                Ok(database.collection(&self.collection))
            }
        }

        #[async_trait]
        impl<T: EntityDocument> EntityStore<T> for $name<T> {
            async fn count(&self) -> Result<u64> {
                self.collection()
                    .await?
                    .count_documents(doc! {})
                    .await
                    .map_err(StoreError::database)
            }

            async fn create(&self, entity: &T) -> Result<()> {
                self.collection()
                    .await?
                    .insert_one(entity)
                    .await
                    .map_err(StoreError::database)?;
                Ok(())
            }

            async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
                self.collection()
                    .await?
                    .find_one(doc! { "_id": id })
                    .await
                    .map_err(StoreError::database)
            }

            async fn update(&self, entity: &T) -> Result<()> {
                self.collection()
                    .await?
                    .replace_one(doc! { "_id": entity.id() }, entity)
                    .await
                    .map_err(StoreError::database)?;
                Ok(())
            }

            async fn delete(&self, id: &str) -> Result<bool> {
                let result = self
                    .collection()
                    .await?
                    .delete_one(doc! { "_id": id })
                    .await
                    .map_err(StoreError::database)?;
                Ok(result.deleted_count > 0)
            }

            async fn list(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<T>> {
                let collection = self.collection().await?;
                let mut find = collection.find(doc! {}).sort(doc! { "_id": 1 });
                if let Some(offset) = offset {
                    find = find.skip(offset);
                }
                if let Some(limit) = limit {
                    find = find.limit(limit);
                }
                let cursor = find.await.map_err(StoreError::database)?;
                cursor.try_collect().await.map_err(StoreError::database)
            }
        }
    };
}

mongo_store!(MongoApplicationStore, applications_collection);
mongo_store!(MongoAuthorizationStore, authorizations_collection);
mongo_store!(MongoScopeStore, scopes_collection);
mongo_store!(MongoTokenStore, tokens_collection);

#[async_trait]
impl<T: EntityDocument> ApplicationStore<T> for MongoApplicationStore<T> {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<T>> {
        self.collection()
            .await?
            .find_one(doc! { "client_id": client_id })
            .await
            .map_err(StoreError::database)
    }
}

#[async_trait]
impl<T: EntityDocument> AuthorizationStore<T> for MongoAuthorizationStore<T> {
    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>> {
        let cursor = self
            .collection()
            .await?
            .find(doc! { "subject": subject })
            .await
            .map_err(StoreError::database)?;
        cursor.try_collect().await.map_err(StoreError::database)
    }

    async fn find_by_application(&self, application_id: &str) -> Result<Vec<T>> {
        let cursor = self
            .collection()
            .await?
            .find(doc! { "application_id": application_id })
            .await
            .map_err(StoreError::database)?;
        cursor.try_collect().await.map_err(StoreError::database)
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = self
            .collection()
            .await?
            .delete_many(doc! {
                "created_at": { "$lt": before.timestamp_millis() },
                "status": { "$ne": "valid" },
            })
            .await
            .map_err(StoreError::database)?;

        if result.deleted_count > 0 {
            info!("Pruned {} authorizations (MongoDB)", result.deleted_count);
        }
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl<T: EntityDocument> ScopeStore<T> for MongoScopeStore<T> {
    async fn find_by_name(&self, name: &str) -> Result<Option<T>> {
        self.collection()
            .await?
            .find_one(doc! { "name": name })
            .await
            .map_err(StoreError::database)
    }

    async fn find_by_names(&self, names: &[String]) -> Result<Vec<T>> {
        let cursor = self
            .collection()
            .await?
            .find(doc! { "name": { "$in": names.to_vec() } })
            .await
            .map_err(StoreError::database)?;
        cursor.try_collect().await.map_err(StoreError::database)
    }
}

#[async_trait]
impl<T: EntityDocument> TokenStore<T> for MongoTokenStore<T> {
    async fn find_by_reference_id(&self, reference_id: &str) -> Result<Option<T>> {
        self.collection()
            .await?
            .find_one(doc! { "reference_id": reference_id })
            .await
            .map_err(StoreError::database)
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>> {
        let cursor = self
            .collection()
            .await?
            .find(doc! { "subject": subject })
            .await
            .map_err(StoreError::database)?;
        cursor.try_collect().await.map_err(StoreError::database)
    }

    async fn find_by_authorization(&self, authorization_id: &str) -> Result<Vec<T>> {
        let cursor = self
            .collection()
            .await?
            .find(doc! { "authorization_id": authorization_id })
            .await
            .map_err(StoreError::database)?;
        cursor.try_collect().await.map_err(StoreError::database)
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let now = Utc::now().timestamp_millis();
        let result = self
            .collection()
            .await?
            .delete_many(doc! {
                "$and": [
                    { "created_at": { "$lt": before.timestamp_millis() } },
                    { "$or": [
                        { "status": { "$ne": "valid" } },
                        { "expires_at": { "$lt": now } },
                    ] },
                ],
            })
            .await
            .map_err(StoreError::database)?;

        if result.deleted_count > 0 {
            info!("Pruned {} tokens (MongoDB)", result.deleted_count);
        }
        Ok(result.deleted_count)
    }
}
