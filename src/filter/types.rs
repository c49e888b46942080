use serde::Serialize;
use std::collections::BTreeMap;

/// Text fields searched by the `keyword` parameter
pub const KEYWORD_FIELDS: &[&str] = &["title", "content", "name", "fileName"];

/// Query parameters that control paging or authentication and never filter
pub const RESERVED_PARAMS: &[&str] = &["page", "limit", "keyword", "token"];

/// One condition on a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Numeric range from `min*`/`max*` parameters; both bounds inclusive
    Range {
        #[serde(skip_serializing_if = "Option::is_none")]
        gte: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lte: Option<f64>,
    },
    /// Set membership from a comma list
    In(Vec<String>),
    /// Case-insensitive substring match
    Contains(String),
    /// Exact numeric equality
    Equals(f64),
}

/// Parsed filter: an optional keyword OR-group plus per-field conditions
/// that are AND-ed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterExpr {
    pub keyword: Option<String>,
    pub conditions: BTreeMap<String, Condition>,
}

impl FilterExpr {
    pub fn is_empty(&self) -> bool {
        self.keyword.is_none() && self.conditions.is_empty()
    }

    pub fn with_condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.insert(field.into(), condition);
        self
    }
}

/// Result of parsing a listing request
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: FilterExpr,
    pub page: i64,
    pub limit: i64,
}

impl ListQuery {
    /// Saturates for pages past any reachable offset
    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Typed bind parameter produced by the SQL generator
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Float(f64),
    Int(i64),
    TextArray(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}
