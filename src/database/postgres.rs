use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseManager;
use super::query_builder::{bind_params_as, bind_params_scalar, count_sql, select_page_sql, table_name, RecordRow, RECORD_COLUMNS};
use super::record::Record;
use super::store::{validate_field, RecordStore, StoreError, StoreResult};
use crate::filter::filter_where::text_expr;
use crate::filter::FilterExpr;

/// Postgres-backed store: one table per collection, fields in `data jsonb`
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unique violations become conflicts naming the offending field
    fn map_write_error(collection: &str, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                let field = db_err
                    .constraint()
                    .and_then(|c| DatabaseManager::field_from_index(collection, c))
                    .unwrap_or_else(|| "id".to_string());
                return StoreError::Conflict {
                    collection: collection.to_string(),
                    field,
                };
            }
        }
        StoreError::Sqlx(err)
    }

    /// Serialises natural-key writes on (collection, field, value) for the
    /// rest of the transaction.
    async fn lock_key(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        collection: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<()> {
        let key = format!("{}:{}:{}", collection, field, value);
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn find_by_key_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        table: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY \"created_at\" ASC LIMIT 1",
            RECORD_COLUMNS,
            table,
            text_expr(field)
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(value)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(Record::from))
    }

    async fn insert_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        collection: &str,
        table: &str,
        record: Record,
    ) -> StoreResult<Record> {
        let sql = format!(
            "INSERT INTO {} (\"id\", \"owner\", \"data\", \"created_at\", \"updated_at\") VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            table, RECORD_COLUMNS
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(record.id)
            .bind(record.owner)
            .bind(Json(&record.data))
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;
        Ok(row.into())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn ensure_collection(&self, collection: &str, unique_fields: &[&str]) -> StoreResult<()> {
        DatabaseManager::ensure_collection(&self.pool, collection, unique_fields).await
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Record>> {
        let sql = format!("SELECT {} FROM {} WHERE \"id\" = $1", RECORD_COLUMNS, table_name(collection)?);
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Record::from))
    }

    async fn find_by_ids(&self, collection: &str, ids: &[Uuid]) -> StoreResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE \"id\" = ANY($1) ORDER BY \"created_at\" ASC",
            RECORD_COLUMNS,
            table_name(collection)?
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn find_one_by(&self, collection: &str, field: &str, value: &str) -> StoreResult<Option<Record>> {
        validate_field(field)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY \"created_at\" ASC LIMIT 1",
            RECORD_COLUMNS,
            table_name(collection)?,
            text_expr(field)
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Record::from))
    }

    async fn exists_conflict(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool> {
        validate_field(field)?;
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1 AND ($2::uuid IS NULL OR \"id\" <> $2))",
            table_name(collection)?,
            text_expr(field)
        );
        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(value)
            .bind(exclude)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_page(&self, collection: &str, filter: &FilterExpr, skip: i64, limit: i64) -> StoreResult<Vec<Record>> {
        let sql_result = select_page_sql(collection, filter, skip, limit)?;
        let q = sqlx::query_as::<_, RecordRow>(&sql_result.query);
        let rows = bind_params_as(q, &sql_result.params).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn count(&self, collection: &str, filter: &FilterExpr) -> StoreResult<i64> {
        let sql_result = count_sql(collection, filter)?;
        let q = sqlx::query_scalar::<_, i64>(&sql_result.query);
        let total = bind_params_scalar(q, &sql_result.params).fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn insert(&self, collection: &str, owner: Option<Uuid>, data: Map<String, Value>) -> StoreResult<Record> {
        let table = table_name(collection)?;
        let mut tx = self.pool.begin().await?;
        let record = Self::insert_in(&mut tx, collection, &table, Record::new(owner, data)).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn update_by_id(&self, collection: &str, id: Uuid, patch: Map<String, Value>) -> StoreResult<Option<Record>> {
        let sql = format!(
            "UPDATE {} SET \"data\" = \"data\" || $2, \"updated_at\" = now() WHERE \"id\" = $1 RETURNING {}",
            table_name(collection)?,
            RECORD_COLUMNS
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .bind(Json(&patch))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;
        Ok(row.map(Record::from))
    }

    async fn update_many(&self, collection: &str, ids: &[Uuid], patch: Map<String, Value>) -> StoreResult<u64> {
        let sql = format!(
            "UPDATE {} SET \"data\" = \"data\" || $2, \"updated_at\" = now() WHERE \"id\" = ANY($1)",
            table_name(collection)?
        );
        let result = sqlx::query(&sql)
            .bind(ids.to_vec())
            .bind(Json(&patch))
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;
        Ok(result.rows_affected())
    }

    async fn delete_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Record>> {
        let sql = format!(
            "DELETE FROM {} WHERE \"id\" = $1 RETURNING {}",
            table_name(collection)?,
            RECORD_COLUMNS
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Record::from))
    }

    async fn delete_many(&self, collection: &str, ids: &[Uuid]) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {} WHERE \"id\" = ANY($1)", table_name(collection)?);
        let result = sqlx::query(&sql).bind(ids.to_vec()).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn upsert_by_key(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        data: Map<String, Value>,
        owner: Option<Uuid>,
    ) -> StoreResult<Record> {
        validate_field(field)?;
        let table = table_name(collection)?;
        let mut tx = self.pool.begin().await?;
        Self::lock_key(&mut tx, collection, field, value).await?;

        let record = match Self::find_by_key_in(&mut tx, &table, field, value).await? {
            Some(existing) => {
                let sql = format!(
                    "UPDATE {} SET \"data\" = \"data\" || $2, \"updated_at\" = now() WHERE \"id\" = $1 RETURNING {}",
                    table, RECORD_COLUMNS
                );
                let row = sqlx::query_as::<_, RecordRow>(&sql)
                    .bind(existing.id)
                    .bind(Json(&data))
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| Self::map_write_error(collection, e))?;
                Record::from(row)
            }
            None => {
                let mut record = Record::new(owner, data);
                record.data.insert(field.to_string(), Value::String(value.to_string()));
                Self::insert_in(&mut tx, collection, &table, record).await?
            }
        };

        tx.commit().await?;
        Ok(record)
    }

    async fn find_or_insert(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        data: Map<String, Value>,
        owner: Option<Uuid>,
    ) -> StoreResult<Record> {
        validate_field(field)?;
        let table = table_name(collection)?;
        let mut tx = self.pool.begin().await?;
        Self::lock_key(&mut tx, collection, field, value).await?;

        let record = match Self::find_by_key_in(&mut tx, &table, field, value).await? {
            Some(existing) => existing,
            None => {
                let mut record = Record::new(owner, data);
                record.data.insert(field.to_string(), Value::String(value.to_string()));
                Self::insert_in(&mut tx, collection, &table, record).await?
            }
        };

        tx.commit().await?;
        Ok(record)
    }

    async fn health_check(&self) -> StoreResult<()> {
        DatabaseManager::health_check(&self.pool).await
    }
}
