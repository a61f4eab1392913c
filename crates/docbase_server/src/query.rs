//! Canonical query-grammar parsing.
//!
//! Two surfaces feed the same [`Filter`] model: flat query parameters
//! (`filter[age][gte]=30&type[age]=number&sort=-createdAt`) and, for
//! count, a structured JSON object (`{"age": {"$gte": 30}}`). Flat
//! values arrive as strings; an explicit `type[field]` hint pins their
//! JSON type, otherwise the legacy heuristic applies: numeric-looking
//! values become numbers, `true`/`false` become booleans, everything
//! else stays a string.

use crate::error::{ServerError, ServerResult};
use docbase_core::{Filter, FilterOp, Query, Sort};
use serde_json::Value;
use std::collections::HashMap;

/// Parses flat query parameters into a find query.
///
/// Recognized keys: `filter[...]`, `type[...]`, `sort`, `limit`,
/// `offset`. Unknown keys are ignored so the routing shell can carry
/// its own parameters alongside.
///
/// # Errors
///
/// Returns `InvalidRequest` on an unknown operator, a non-numeric
/// `limit`/`offset`, or a value that contradicts its type hint.
pub fn parse_query(params: &[(String, String)]) -> ServerResult<Query> {
    let mut query = Query::new();
    query.filters = parse_filters(params)?;

    for (key, value) in params {
        match key.as_str() {
            "sort" => query.sort = Some(Sort::parse(value)),
            "limit" => {
                let limit: usize = value.parse().map_err(|_| {
                    ServerError::invalid_request(format!("limit is not a number: '{value}'"))
                })?;
                query.limit = Some(limit);
            }
            "offset" => {
                query.offset = value.parse().map_err(|_| {
                    ServerError::invalid_request(format!("offset is not a number: '{value}'"))
                })?;
            }
            _ => {}
        }
    }
    Ok(query)
}

/// Parses the `filter[...]` and `type[...]` parameters into filters.
///
/// # Errors
///
/// Returns `InvalidRequest` on an unknown operator or type hint.
pub fn parse_filters(params: &[(String, String)]) -> ServerResult<Vec<Filter>> {
    let mut hints: HashMap<String, TypeHint> = HashMap::new();
    for (key, value) in params {
        if let Some((field, None)) = bracket_parts(key, "type") {
            hints.insert(field, TypeHint::parse(value)?);
        }
    }

    let mut filters = Vec::new();
    for (key, value) in params {
        let Some((field, op)) = bracket_parts(key, "filter") else {
            continue;
        };
        let op = match op {
            None => FilterOp::Eq,
            Some(name) => FilterOp::parse(&name).filter(|op| *op != FilterOp::In).ok_or_else(
                || ServerError::invalid_request(format!("unknown filter operator: '{name}'")),
            )?,
        };
        let value = coerce_value(value, hints.get(&field));
        filters.push(Filter::new(field, op, value));
    }
    Ok(filters)
}

/// Parses a structured JSON filter object into filters.
///
/// Each entry is either a plain value (equality) or an operator object
/// (`{"$gte": 30}`, `{"$in": [..]}`), matching the count endpoint's
/// body shape.
///
/// # Errors
///
/// Returns `InvalidRequest` if the value is not an object, an operator
/// is unknown, or `$in` is given a non-array.
pub fn parse_json_filters(value: &Value) -> ServerResult<Vec<Filter>> {
    let object = value
        .as_object()
        .ok_or_else(|| ServerError::invalid_request("filters must be a JSON object"))?;

    let mut filters = Vec::new();
    for (field, spec) in object {
        match spec {
            Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                for (name, operand) in ops {
                    let op = FilterOp::parse(&name[1..]).ok_or_else(|| {
                        ServerError::invalid_request(format!("unknown filter operator: '{name}'"))
                    })?;
                    if op == FilterOp::In && !operand.is_array() {
                        return Err(ServerError::invalid_request("$in expects an array"));
                    }
                    filters.push(Filter::new(field.clone(), op, operand.clone()));
                }
            }
            other => filters.push(Filter::eq(field.clone(), other.clone())),
        }
    }
    Ok(filters)
}

/// Parses a `select` parameter value into a projection field list.
#[must_use]
pub fn parse_select(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Explicit value type for a flat filter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeHint {
    String,
    Number,
    Boolean,
}

impl TypeHint {
    fn parse(raw: &str) -> ServerResult<Self> {
        match raw {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            other => Err(ServerError::invalid_request(format!(
                "unknown type hint: '{other}'"
            ))),
        }
    }
}

/// Coerces a raw parameter value into a JSON value.
///
/// A hint forces the type, falling back to a string when the raw value
/// does not fit. Without a hint the legacy heuristic applies.
fn coerce_value(raw: &str, hint: Option<&TypeHint>) -> Value {
    match hint {
        Some(TypeHint::String) => Value::String(raw.to_string()),
        Some(TypeHint::Number) => parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string())),
        Some(TypeHint::Boolean) => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        None => {
            if raw == "true" {
                Value::Bool(true)
            } else if raw == "false" {
                Value::Bool(false)
            } else if let Some(number) = parse_number(raw) {
                number
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<f64>().ok().filter(|n| n.is_finite()).map(Value::from)
}

/// Splits `prefix[field]` or `prefix[field][op]` into its parts.
fn bracket_parts(key: &str, prefix: &str) -> Option<(String, Option<String>)> {
    let rest = key.strip_prefix(prefix)?.strip_prefix('[')?;
    let (field, rest) = rest.split_once(']')?;
    if rest.is_empty() {
        return Some((field.to_string(), None));
    }
    let op = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some((field.to_string(), Some(op.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn equality_filter_with_heuristic_coercion() {
        let filters = parse_filters(&params(&[
            ("filter[age]", "36"),
            ("filter[name]", "ada"),
            ("filter[active]", "true"),
        ]))
        .unwrap();

        assert_eq!(filters[0], Filter::eq("age", json!(36)));
        assert_eq!(filters[1], Filter::eq("name", json!("ada")));
        assert_eq!(filters[2], Filter::eq("active", json!(true)));
    }

    #[test]
    fn operator_filters() {
        let filters = parse_filters(&params(&[
            ("filter[age][gte]", "30"),
            ("filter[age][lt]", "50"),
            ("filter[role][ne]", "admin"),
        ]))
        .unwrap();

        assert_eq!(filters[0], Filter::new("age", FilterOp::Gte, json!(30)));
        assert_eq!(filters[1], Filter::new("age", FilterOp::Lt, json!(50)));
        assert_eq!(filters[2], Filter::new("role", FilterOp::Ne, json!("admin")));
    }

    #[test]
    fn type_hint_overrides_heuristic() {
        let filters = parse_filters(&params(&[
            ("filter[zip]", "01234"),
            ("type[zip]", "string"),
        ]))
        .unwrap();

        assert_eq!(filters[0], Filter::eq("zip", json!("01234")));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let result = parse_filters(&params(&[("filter[age][like]", "3")]));
        assert!(matches!(result, Err(ServerError::InvalidRequest(_))));

        // `in` is JSON-body-only; the flat grammar has no list syntax
        let result = parse_filters(&params(&[("filter[age][in]", "3")]));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_type_hint_is_rejected() {
        let result = parse_filters(&params(&[("type[age]", "integer")]));
        assert!(matches!(result, Err(ServerError::InvalidRequest(_))));
    }

    #[test]
    fn full_query_parse() {
        let query = parse_query(&params(&[
            ("filter[age][gte]", "30"),
            ("sort", "-age"),
            ("limit", "10"),
            ("offset", "20"),
            ("unrelated", "ignored"),
        ]))
        .unwrap();

        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.sort, Some(Sort::descending("age")));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, 20);
    }

    #[test]
    fn bad_pagination_is_rejected() {
        assert!(parse_query(&params(&[("limit", "lots")])).is_err());
        assert!(parse_query(&params(&[("offset", "-1")])).is_err());
    }

    #[test]
    fn json_filters_equality_and_operators() {
        let filters = parse_json_filters(&json!({
            "role": "admin",
            "age": {"$gte": 30, "$lt": 50},
            "team": {"$in": ["core", "infra"]}
        }))
        .unwrap();

        assert!(filters.contains(&Filter::eq("role", json!("admin"))));
        assert!(filters.contains(&Filter::new("age", FilterOp::Gte, json!(30))));
        assert!(filters.contains(&Filter::new("age", FilterOp::Lt, json!(50))));
        assert!(filters.contains(&Filter::new(
            "team",
            FilterOp::In,
            json!(["core", "infra"])
        )));
    }

    #[test]
    fn json_filter_object_without_dollar_keys_is_equality() {
        let filters = parse_json_filters(&json!({"meta": {"a": 1}})).unwrap();
        assert_eq!(filters[0], Filter::eq("meta", json!({"a": 1})));
    }

    #[test]
    fn json_filters_reject_bad_shapes() {
        assert!(parse_json_filters(&json!([1, 2])).is_err());
        assert!(parse_json_filters(&json!({"age": {"$like": 3}})).is_err());
        assert!(parse_json_filters(&json!({"team": {"$in": "core"}})).is_err());
    }

    #[test]
    fn select_parse() {
        assert_eq!(parse_select("a,b , c"), vec!["a", "b", "c"]);
        assert_eq!(parse_select(""), Vec::<String>::new());
    }
}
