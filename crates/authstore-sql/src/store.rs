//! SQL Entity Stores
//!
//! One store per entity kind, generic over the entity type. Writes
//! serialize the entity to JSON and denormalize the queried fields into
//! real columns; reads deserialize the `document` column back into the
//! entity type.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::info;

use authstore_core::{
    ApplicationStore, AuthorizationStore, EntityDocument, EntityStore, Result, ScopeStore,
    StoreError, TokenStore,
};

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn integer(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

fn encode<T: EntityDocument>(entity: &T) -> Result<Value> {
    serde_json::to_value(entity).map_err(StoreError::serialization)
}

fn decode<T: EntityDocument>(document: &str) -> Result<T> {
    serde_json::from_str(document).map_err(StoreError::serialization)
}

/// Table-level plumbing shared by the four stores.
struct SqlTable {
    pool: PgPool,
    table: String,
}

impl SqlTable {
    fn new(pool: PgPool, table: String) -> Self {
        Self { pool, table }
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::database)?;
        Ok(count as u64)
    }

    async fn document_by_id(&self, id: &str) -> Result<Option<String>> {
        let row = sqlx::query(&format!(
            "SELECT document FROM {} WHERE id = $1",
            self.table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(|r| r.try_get("document").map_err(StoreError::database))
            .transpose()
    }

    async fn document_where(&self, column: &str, value: &str) -> Result<Option<String>> {
        let row = sqlx::query(&format!(
            "SELECT document FROM {} WHERE {column} = $1",
            self.table
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(|r| r.try_get("document").map_err(StoreError::database))
            .transpose()
    }

    async fn documents_where(&self, column: &str, value: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!(
            "SELECT document FROM {} WHERE {column} = $1 ORDER BY id",
            self.table
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter()
            .map(|r| r.try_get("document").map_err(StoreError::database))
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn documents(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<String>> {
        // LIMIT NULL / OFFSET NULL mean "no limit" / "no offset".
        let rows = sqlx::query(&format!(
            "SELECT document FROM {} ORDER BY id LIMIT $1 OFFSET $2",
            self.table
        ))
        .bind(limit)
        .bind(offset.map(|o| o as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter()
            .map(|r| r.try_get("document").map_err(StoreError::database))
            .collect()
    }
}

fn decode_all<T: EntityDocument>(documents: Vec<String>) -> Result<Vec<T>> {
    documents.iter().map(|d| decode(d)).collect()
}

macro_rules! sql_entity_store {
    ($name:ident) => {
        pub struct $name<T: EntityDocument> {
            inner: SqlTable,
            _entity: PhantomData<fn() -> T>,
        }

        impl<T: EntityDocument> $name<T> {
            pub fn new(pool: PgPool, table: String) -> Self {
                Self {
                    inner: SqlTable::new(pool, table),
                    _entity: PhantomData,
                }
            }
        }
    };
}

sql_entity_store!(SqlApplicationStore);
sql_entity_store!(SqlAuthorizationStore);
sql_entity_store!(SqlScopeStore);
sql_entity_store!(SqlTokenStore);

// ============================================================================
// Applications
// ============================================================================

#[async_trait]
impl<T: EntityDocument> EntityStore<T> for SqlApplicationStore<T> {
    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn create(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, client_id, document) VALUES ($1, $2, $3)",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "client_id"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.inner
            .document_by_id(id)
            .await?
            .map(|d| decode(&d))
            .transpose()
    }

    async fn update(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "UPDATE {} SET client_id = $2, document = $3 WHERE id = $1",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "client_id"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<T>> {
        decode_all(self.inner.documents(limit, offset).await?)
    }
}

#[async_trait]
impl<T: EntityDocument> ApplicationStore<T> for SqlApplicationStore<T> {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<T>> {
        self.inner
            .document_where("client_id", client_id)
            .await?
            .map(|d| decode(&d))
            .transpose()
    }
}

// ============================================================================
// Authorizations
// ============================================================================

#[async_trait]
impl<T: EntityDocument> EntityStore<T> for SqlAuthorizationStore<T> {
    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn create(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, application_id, subject, status, created_at, document) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "application_id"))
        .bind(text(&value, "subject"))
        .bind(text(&value, "status"))
        .bind(integer(&value, "created_at"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.inner
            .document_by_id(id)
            .await?
            .map(|d| decode(&d))
            .transpose()
    }

    async fn update(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "UPDATE {} SET application_id = $2, subject = $3, status = $4, created_at = $5, \
             document = $6 WHERE id = $1",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "application_id"))
        .bind(text(&value, "subject"))
        .bind(text(&value, "status"))
        .bind(integer(&value, "created_at"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<T>> {
        decode_all(self.inner.documents(limit, offset).await?)
    }
}

#[async_trait]
impl<T: EntityDocument> AuthorizationStore<T> for SqlAuthorizationStore<T> {
    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>> {
        decode_all(self.inner.documents_where("subject", subject).await?)
    }

    async fn find_by_application(&self, application_id: &str) -> Result<Vec<T>> {
        decode_all(
            self.inner
                .documents_where("application_id", application_id)
                .await?,
        )
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE created_at < $1 AND status IS DISTINCT FROM 'valid'",
            self.inner.table
        ))
        .bind(before.timestamp_millis())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            info!("Pruned {} authorizations (SQL)", pruned);
        }
        Ok(pruned)
    }
}

// ============================================================================
// Scopes
// ============================================================================

#[async_trait]
impl<T: EntityDocument> EntityStore<T> for SqlScopeStore<T> {
    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn create(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, name, document) VALUES ($1, $2, $3)",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "name"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.inner
            .document_by_id(id)
            .await?
            .map(|d| decode(&d))
            .transpose()
    }

    async fn update(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "UPDATE {} SET name = $2, document = $3 WHERE id = $1",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "name"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<T>> {
        decode_all(self.inner.documents(limit, offset).await?)
    }
}

#[async_trait]
impl<T: EntityDocument> ScopeStore<T> for SqlScopeStore<T> {
    async fn find_by_name(&self, name: &str) -> Result<Option<T>> {
        self.inner
            .document_where("name", name)
            .await?
            .map(|d| decode(&d))
            .transpose()
    }

    async fn find_by_names(&self, names: &[String]) -> Result<Vec<T>> {
        let rows = sqlx::query(&format!(
            "SELECT document FROM {} WHERE name = ANY($1) ORDER BY id",
            self.inner.table
        ))
        .bind(names)
        .fetch_all(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;

        rows.into_iter()
            .map(|r| {
                let document: String = r.try_get("document").map_err(StoreError::database)?;
                decode(&document)
            })
            .collect()
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[async_trait]
impl<T: EntityDocument> EntityStore<T> for SqlTokenStore<T> {
    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn create(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, application_id, authorization_id, subject, reference_id, \
             status, created_at, expires_at, document) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "application_id"))
        .bind(text(&value, "authorization_id"))
        .bind(text(&value, "subject"))
        .bind(text(&value, "reference_id"))
        .bind(text(&value, "status"))
        .bind(integer(&value, "created_at"))
        .bind(integer(&value, "expires_at"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.inner
            .document_by_id(id)
            .await?
            .map(|d| decode(&d))
            .transpose()
    }

    async fn update(&self, entity: &T) -> Result<()> {
        let value = encode(entity)?;
        sqlx::query(&format!(
            "UPDATE {} SET application_id = $2, authorization_id = $3, subject = $4, \
             reference_id = $5, status = $6, created_at = $7, expires_at = $8, document = $9 \
             WHERE id = $1",
            self.inner.table
        ))
        .bind(entity.id())
        .bind(text(&value, "application_id"))
        .bind(text(&value, "authorization_id"))
        .bind(text(&value, "subject"))
        .bind(text(&value, "reference_id"))
        .bind(text(&value, "status"))
        .bind(integer(&value, "created_at"))
        .bind(integer(&value, "expires_at"))
        .bind(value.to_string())
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list(&self, limit: Option<i64>, offset: Option<u64>) -> Result<Vec<T>> {
        decode_all(self.inner.documents(limit, offset).await?)
    }
}

#[async_trait]
impl<T: EntityDocument> TokenStore<T> for SqlTokenStore<T> {
    async fn find_by_reference_id(&self, reference_id: &str) -> Result<Option<T>> {
        self.inner
            .document_where("reference_id", reference_id)
            .await?
            .map(|d| decode(&d))
            .transpose()
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Vec<T>> {
        decode_all(self.inner.documents_where("subject", subject).await?)
    }

    async fn find_by_authorization(&self, authorization_id: &str) -> Result<Vec<T>> {
        decode_all(
            self.inner
                .documents_where("authorization_id", authorization_id)
                .await?,
        )
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE created_at < $1 \
             AND (status IS DISTINCT FROM 'valid' OR expires_at < $2)",
            self.inner.table
        ))
        .bind(before.timestamp_millis())
        .bind(now)
        .execute(&self.inner.pool)
        .await
        .map_err(StoreError::database)?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            info!("Pruned {} tokens (SQL)", pruned);
        }
        Ok(pruned)
    }
}
