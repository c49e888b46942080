use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use super::query_builder::{quote_identifier, table_name};
use super::store::{validate_field, StoreError, StoreResult};
use crate::config::DatabaseConfig;

/// Connection pool setup and collection DDL
pub struct DatabaseManager;

impl DatabaseManager {
    /// Opens the pool described by the database config section
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<PgPool> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Connection("DATABASE_URL is not set".to_string()))?;

        // Validate before handing it to sqlx so a typo reports clearly
        url::Url::parse(url).map_err(|_| StoreError::Connection("Invalid database URL".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(pool)
    }

    /// Creates the collection table and one unique expression index per field
    pub async fn ensure_collection(pool: &PgPool, collection: &str, unique_fields: &[&str]) -> StoreResult<()> {
        let table = table_name(collection)?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                \"id\" uuid PRIMARY KEY, \
                \"owner\" uuid NULL, \
                \"data\" jsonb NOT NULL DEFAULT '{{}}'::jsonb, \
                \"created_at\" timestamptz NOT NULL DEFAULT now(), \
                \"updated_at\" timestamptz NOT NULL DEFAULT now())",
            table
        );
        sqlx::query(&ddl).execute(pool).await?;

        for field in unique_fields {
            validate_field(field)?;
            let index = quote_identifier(&Self::unique_index_name(collection, field));
            let ddl = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ((\"data\"->>'{}'))",
                index, table, field
            );
            sqlx::query(&ddl).execute(pool).await?;
        }

        info!("Ensured collection {} (unique: {:?})", collection, unique_fields);
        Ok(())
    }

    pub fn unique_index_name(collection: &str, field: &str) -> String {
        format!("{}_{}_key", collection, field)
    }

    /// Reverse of `unique_index_name`, used to name the field in conflicts
    pub fn field_from_index(collection: &str, index: &str) -> Option<String> {
        index
            .strip_prefix(collection)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.strip_suffix("_key"))
            .map(str::to_string)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
