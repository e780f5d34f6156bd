//! Schema Bootstrap
//!
//! Creates the store tables and indexes. Statements are idempotent;
//! run once at startup.

use sqlx::PgPool;
use tracing::debug;

use authstore_core::{Result, StoreError};

use crate::SqlStoreOptions;

pub(crate) fn schema_statements(options: &SqlStoreOptions) -> Vec<String> {
    let applications = options.applications_table();
    let authorizations = options.authorizations_table();
    let scopes = options.scopes_table();
    let tokens = options.tokens_table();

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {applications} (
                id TEXT PRIMARY KEY,
                client_id TEXT,
                document TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{applications}_client_id \
             ON {applications}(client_id)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {authorizations} (
                id TEXT PRIMARY KEY,
                application_id TEXT,
                subject TEXT,
                status TEXT,
                created_at BIGINT,
                document TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{authorizations}_subject \
             ON {authorizations}(subject)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{authorizations}_application_id \
             ON {authorizations}(application_id)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {scopes} (
                id TEXT PRIMARY KEY,
                name TEXT,
                document TEXT NOT NULL
            )"
        ),
        format!("CREATE UNIQUE INDEX IF NOT EXISTS idx_{scopes}_name ON {scopes}(name)"),
        format!(
            "CREATE TABLE IF NOT EXISTS {tokens} (
                id TEXT PRIMARY KEY,
                application_id TEXT,
                authorization_id TEXT,
                subject TEXT,
                reference_id TEXT,
                status TEXT,
                created_at BIGINT,
                expires_at BIGINT,
                document TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{tokens}_reference_id \
             ON {tokens}(reference_id)"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{tokens}_subject ON {tokens}(subject)"),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{tokens}_authorization_id \
             ON {tokens}(authorization_id)"
        ),
    ]
}

pub async fn init_schema(pool: &PgPool, options: &SqlStoreOptions) -> Result<()> {
    for statement in schema_statements(options) {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(StoreError::database)?;
    }
    debug!(prefix = %options.table_prefix, "initialized store schema");
    Ok(())
}
