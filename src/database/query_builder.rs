use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{QueryAs, QueryScalar};
use uuid::Uuid;

use super::record::Record;
use super::store::{validate_collection_name, StoreResult};
use crate::filter::filter_where::FilterWhere;
use crate::filter::{FilterExpr, SqlParam, SqlResult};

pub const RECORD_COLUMNS: &str = "\"id\", \"owner\", \"data\", \"created_at\", \"updated_at\"";

/// Raw row shape shared by every collection table
#[derive(Debug, sqlx::FromRow)]
pub struct RecordRow {
    pub id: Uuid,
    pub owner: Option<Uuid>,
    pub data: sqlx::types::Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Record {
            id: row.id,
            owner: row.owner,
            data: row.data.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validated, quoted table name for a collection
pub fn table_name(collection: &str) -> StoreResult<String> {
    validate_collection_name(collection)?;
    Ok(quote_identifier(collection))
}

/// SELECT for one page of a filtered collection, oldest first
pub fn select_page_sql(collection: &str, filter: &FilterExpr, skip: i64, limit: i64) -> StoreResult<SqlResult> {
    let table = table_name(collection)?;
    let (where_clause, mut params) = FilterWhere::generate(filter, 0)?;
    let offset_index = params.len() + 1;
    let limit_index = params.len() + 2;
    params.push(SqlParam::Int(skip.max(0)));
    params.push(SqlParam::Int(limit.max(0)));
    Ok(SqlResult {
        query: format!(
            "SELECT {} FROM {} WHERE {} ORDER BY \"created_at\" ASC, \"id\" ASC OFFSET ${} LIMIT ${}",
            RECORD_COLUMNS, table, where_clause, offset_index, limit_index
        ),
        params,
    })
}

pub fn count_sql(collection: &str, filter: &FilterExpr) -> StoreResult<SqlResult> {
    let table = table_name(collection)?;
    let (where_clause, params) = FilterWhere::generate(filter, 0)?;
    Ok(SqlResult {
        query: format!("SELECT COUNT(*) FROM {} WHERE {}", table, where_clause),
        params,
    })
}

pub fn bind_params_as<'q, O>(
    mut q: QueryAs<'q, Postgres, O, PgArguments>,
    params: &[SqlParam],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for param in params {
        q = match param {
            SqlParam::Text(s) => q.bind(s.clone()),
            SqlParam::Float(f) => q.bind(*f),
            SqlParam::Int(i) => q.bind(*i),
            SqlParam::TextArray(values) => q.bind(values.clone()),
        };
    }
    q
}

pub fn bind_params_scalar<'q, O>(
    mut q: QueryScalar<'q, Postgres, O, PgArguments>,
    params: &[SqlParam],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for param in params {
        q = match param {
            SqlParam::Text(s) => q.bind(s.clone()),
            SqlParam::Float(f) => q.bind(*f),
            SqlParam::Int(i) => q.bind(*i),
            SqlParam::TextArray(values) => q.bind(values.clone()),
        };
    }
    q
}
