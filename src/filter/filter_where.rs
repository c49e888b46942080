use super::error::FilterError;
use super::query::validate_field_name;
use super::types::{Condition, FilterExpr, SqlParam, KEYWORD_FIELDS};

/// Columns stored outside the `data` document
const COLUMN_FIELDS: &[(&str, &str)] = &[
    ("id", "\"id\""),
    ("owner", "\"owner\""),
    ("createdAt", "\"created_at\""),
    ("updatedAt", "\"updated_at\""),
];

/// Builds a parameterised WHERE clause over `(id, owner, data jsonb, ...)` rows.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Returns the clause (without `WHERE`) and its bind parameters, numbered
    /// after `starting_param_index`.
    pub fn generate(filter: &FilterExpr, starting_param_index: usize) -> Result<(String, Vec<SqlParam>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(filter)
    }

    fn build(&mut self, filter: &FilterExpr) -> Result<(String, Vec<SqlParam>), FilterError> {
        let mut sql_conditions = vec![];

        if let Some(keyword) = &filter.keyword {
            let pattern = self.param(SqlParam::Text(like_pattern(keyword)));
            let group: Vec<String> = KEYWORD_FIELDS
                .iter()
                .map(|field| format!("{} ILIKE {} ESCAPE '\\'", text_expr(field), pattern))
                .collect();
            sql_conditions.push(format!("({})", group.join(" OR ")));
        }

        for (field, condition) in &filter.conditions {
            validate_field_name(field)?;
            sql_conditions.push(self.build_sql_condition(field, condition));
        }

        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        Ok((where_clause, self.param_values.clone()))
    }

    fn build_sql_condition(&mut self, field: &str, condition: &Condition) -> String {
        match condition {
            Condition::Range { gte, lte } => {
                let numeric = numeric_expr(field);
                let mut bounds = vec![];
                if let Some(min) = gte {
                    bounds.push(format!("{} >= {}::numeric", numeric, self.param(SqlParam::Float(*min))));
                }
                if let Some(max) = lte {
                    bounds.push(format!("{} <= {}::numeric", numeric, self.param(SqlParam::Float(*max))));
                }
                if bounds.is_empty() {
                    format!("{} IS NOT NULL", numeric)
                } else {
                    bounds.join(" AND ")
                }
            }
            Condition::In(values) => {
                if values.is_empty() {
                    return "1=0".to_string();
                }
                // `?|` matches a string scalar or any element of a string array
                let param = self.param(SqlParam::TextArray(values.clone()));
                format!("({} ?| {}::text[])", json_expr(field), param)
            }
            Condition::Contains(needle) => {
                let param = self.param(SqlParam::Text(like_pattern(needle)));
                format!("{} ILIKE {} ESCAPE '\\'", text_expr(field), param)
            }
            Condition::Equals(number) => {
                let param = self.param(SqlParam::Float(*number));
                format!("{} = to_jsonb({}::float8)", json_expr(field), param)
            }
        }
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

fn column_for(field: &str) -> Option<&'static str> {
    COLUMN_FIELDS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, column)| *column)
}

/// jsonb value of a field; callers validate `field` first
pub fn json_expr(field: &str) -> String {
    match column_for(field) {
        Some(column) => format!("to_jsonb({})", column),
        None => format!("\"data\"->'{}'", field),
    }
}

/// Text value of a field
pub fn text_expr(field: &str) -> String {
    match column_for(field) {
        Some(column) => format!("{}::text", column),
        None => format!("\"data\"->>'{}'", field),
    }
}

fn numeric_expr(field: &str) -> String {
    let json = json_expr(field);
    format!(
        "(CASE WHEN jsonb_typeof({json}) = 'number' THEN ({json})::text::numeric END)",
        json = json
    )
}

/// Wraps a literal in `%...%`, escaping LIKE metacharacters
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let (sql, params) = FilterWhere::generate(&FilterExpr::default(), 0).unwrap();
        assert_eq!(sql, "1=1");
        assert!(params.is_empty());
    }

    #[test]
    fn range_binds_both_bounds() {
        let filter = FilterExpr::default()
            .with_condition("cost", Condition::Range { gte: Some(10.0), lte: Some(50.0) });
        let (sql, params) = FilterWhere::generate(&filter, 0).unwrap();
        assert!(sql.contains(">= $1::numeric"));
        assert!(sql.contains("<= $2::numeric"));
        assert!(sql.contains("jsonb_typeof(\"data\"->'cost') = 'number'"));
        assert_eq!(params, vec![SqlParam::Float(10.0), SqlParam::Float(50.0)]);
    }

    #[test]
    fn keyword_is_one_or_group_with_one_param() {
        let filter = FilterExpr {
            keyword: Some("50%".into()),
            ..Default::default()
        };
        let (sql, params) = FilterWhere::generate(&filter, 2).unwrap();
        assert_eq!(sql.matches(" OR ").count(), KEYWORD_FIELDS.len() - 1);
        assert!(sql.contains("\"data\"->>'fileName' ILIKE $3"));
        assert_eq!(params, vec![SqlParam::Text("%50\\%%".into())]);
    }

    #[test]
    fn system_fields_use_columns() {
        let filter = FilterExpr::default().with_condition("owner", Condition::In(vec!["x".into()]));
        let (sql, _) = FilterWhere::generate(&filter, 0).unwrap();
        assert_eq!(sql, "(to_jsonb(\"owner\") ?| $1::text[])");
    }

    #[test]
    fn rejects_injected_field_names() {
        let filter = FilterExpr::default().with_condition("a') OR 1=1 --", Condition::Equals(1.0));
        assert!(FilterWhere::generate(&filter, 0).is_err());
    }
}
