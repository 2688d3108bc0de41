//! Evaluation of record filters for in-process sources.
//!
//! Filters are JSON objects in the usual `{ field: { _op: operand } }`
//! shape, combined with `_and` / `_or` arrays. Field names may be dotted
//! paths into nested objects. An absent filter, `null`, an empty array or an
//! empty object match every record.
//!
//! Supported operators: `_eq`, `_neq`, `_in`, `_nin`, `_null`, `_nnull`,
//! `_gt`, `_gte`, `_lt`, `_lte`, `_contains`. A bare value instead of an
//! operator object is shorthand for `_eq`. Unknown operators never match.

use searchsync_core::Record;
use serde_json::Value;
use std::cmp::Ordering;

/// Returns true if `record` satisfies `filter`.
pub fn matches_filter(record: &Record, filter: Option<&Value>) -> bool {
    match filter {
        None => true,
        Some(filter) => matches_node(record, filter),
    }
}

fn matches_node(record: &Record, filter: &Value) -> bool {
    match filter {
        Value::Null => true,
        Value::Array(items) => items.iter().all(|f| matches_node(record, f)),
        Value::Object(clauses) => clauses.iter().all(|(key, clause)| match key.as_str() {
            "_and" => clause
                .as_array()
                .is_some_and(|items| items.iter().all(|f| matches_node(record, f))),
            "_or" => clause
                .as_array()
                .is_some_and(|items| items.iter().any(|f| matches_node(record, f))),
            field => matches_field(lookup(record, field), clause),
        }),
        _ => false,
    }
}

fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn matches_field(value: Option<&Value>, clause: &Value) -> bool {
    let Value::Object(operators) = clause else {
        return value == Some(clause);
    };

    operators.iter().all(|(op, operand)| {
        let is_null = value.map_or(true, Value::is_null);
        match op.as_str() {
            "_eq" => value == Some(operand),
            "_neq" => value != Some(operand),
            "_in" => operand
                .as_array()
                .is_some_and(|set| value.is_some_and(|v| set.contains(v))),
            "_nin" => operand
                .as_array()
                .is_some_and(|set| !value.is_some_and(|v| set.contains(v))),
            "_null" => operand.as_bool() == Some(is_null),
            "_nnull" => operand.as_bool() == Some(!is_null),
            "_gt" => compare(value, operand) == Some(Ordering::Greater),
            "_gte" => matches!(
                compare(value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            "_lt" => compare(value, operand) == Some(Ordering::Less),
            "_lte" => matches!(
                compare(value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            "_contains" => match (value, operand) {
                (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
                (Some(Value::Array(items)), needle) => items.contains(needle),
                _ => false,
            },
            unknown => {
                tracing::debug!(operator = unknown, "unsupported filter operator");
                false
            }
        }
    })
}

fn compare(value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (value?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
