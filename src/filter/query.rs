use super::error::FilterError;
use super::types::{Condition, FilterExpr, ListQuery, RESERVED_PARAMS};
use crate::config::FilterConfig;

/// Field names reach SQL as JSON path literals, so only plain identifiers pass.
pub fn validate_field_name(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || name.len() > 64 || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidField(name.to_string()));
    }
    Ok(())
}

impl ListQuery {
    /// Translate raw query-string pairs into a filter plus paging.
    ///
    /// `page` defaults to 1 and `limit` to the configured default; values that
    /// do not parse fall back to those defaults and `limit` is capped at the
    /// configured maximum. `keyword` expands into an OR-group across the text
    /// fields. Every other pair is read by shape:
    ///
    /// - `minX` / `maxX`: inclusive numeric bound on field `x`; both bounds
    ///   for the same field merge into one range
    /// - value containing a comma: set membership over the trimmed parts
    /// - non-numeric value: case-insensitive substring match
    /// - numeric value: exact numeric equality
    ///
    /// Empty values are ignored. A repeated plain key keeps its last value.
    pub fn from_params(params: &[(String, String)], limits: &FilterConfig) -> Result<Self, FilterError> {
        let mut page: i64 = 1;
        let mut limit: i64 = limits.default_limit;
        let mut filter = FilterExpr::default();

        for (key, raw) in params {
            let value = raw.trim();
            match key.as_str() {
                "page" => {
                    page = value.parse::<i64>().ok().filter(|p| *p >= 1).unwrap_or(1);
                    continue;
                }
                "limit" => {
                    limit = value
                        .parse::<i64>()
                        .ok()
                        .filter(|l| *l >= 1)
                        .unwrap_or(limits.default_limit);
                    continue;
                }
                "keyword" => {
                    filter.keyword = (!value.is_empty()).then(|| value.to_string());
                    continue;
                }
                k if RESERVED_PARAMS.contains(&k) => continue,
                _ => {}
            }

            if value.is_empty() {
                continue;
            }

            if let Some((field, is_min)) = range_target(key)? {
                let bound = parse_number(value).ok_or_else(|| FilterError::InvalidRangeValue {
                    key: key.clone(),
                    value: value.to_string(),
                })?;
                let entry = filter
                    .conditions
                    .entry(field)
                    .or_insert(Condition::Range { gte: None, lte: None });
                if !matches!(entry, Condition::Range { .. }) {
                    *entry = Condition::Range { gte: None, lte: None };
                }
                if let Condition::Range { gte, lte } = entry {
                    if is_min {
                        *gte = Some(bound);
                    } else {
                        *lte = Some(bound);
                    }
                }
                continue;
            }

            validate_field_name(key)?;
            let condition = if value.contains(',') {
                Condition::In(
                    value
                        .split(',')
                        .map(|part| part.trim().to_string())
                        .collect(),
                )
            } else if let Some(number) = parse_number(value) {
                Condition::Equals(number)
            } else {
                Condition::Contains(value.to_string())
            };
            filter.conditions.insert(key.clone(), condition);
        }

        if let Some(max) = limits.max_limit {
            limit = limit.min(max);
        }

        if limits.debug_logging {
            tracing::debug!(?filter, page, limit, "parsed list query");
        }

        Ok(Self { filter, page, limit })
    }
}

/// `minCost` -> `("cost", true)`, `maxCost` -> `("cost", false)`
fn range_target(key: &str) -> Result<Option<(String, bool)>, FilterError> {
    let is_min = key.starts_with("min");
    if !is_min && !key.starts_with("max") {
        return Ok(None);
    }
    let rest = &key[3..];
    let mut chars = rest.chars();
    let field = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => return Err(FilterError::EmptyRangeField(key.to_string())),
    };
    validate_field_name(&field)?;
    Ok(Some((field, is_min)))
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}
