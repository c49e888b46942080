use serde_json::Value;

use super::types::{Condition, FilterExpr, KEYWORD_FIELDS};

/// Anything that can hand out field values by name.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<Value>;
}

/// Evaluates a filter in memory with the same meaning as the SQL generator.
pub fn matches(filter: &FilterExpr, source: &impl FieldSource) -> bool {
    if let Some(keyword) = &filter.keyword {
        let needle = keyword.to_lowercase();
        let hit = KEYWORD_FIELDS
            .iter()
            .any(|field| source.field(field).is_some_and(|v| contains_text(&v, &needle)));
        if !hit {
            return false;
        }
    }

    filter.conditions.iter().all(|(field, condition)| {
        let Some(value) = source.field(field) else {
            return false;
        };
        match condition {
            Condition::Range { gte, lte } => match value.as_f64() {
                Some(n) => gte.map_or(true, |min| n >= min) && lte.map_or(true, |max| n <= max),
                None => false,
            },
            Condition::In(set) => match &value {
                Value::String(s) => set.contains(s),
                Value::Array(items) => items
                    .iter()
                    .any(|item| item.as_str().is_some_and(|s| set.iter().any(|m| m == s))),
                _ => false,
            },
            Condition::Contains(needle) => contains_text(&value, &needle.to_lowercase()),
            Condition::Equals(expected) => value.as_f64() == Some(*expected),
        }
    })
}

fn contains_text(value: &Value, needle_lower: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle_lower),
        Value::Number(n) => n.to_string().contains(needle_lower),
        Value::Bool(b) => b.to_string().contains(needle_lower),
        Value::Array(items) => items.iter().any(|item| contains_text(item, needle_lower)),
        _ => false,
    }
}
