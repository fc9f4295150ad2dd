//! Intent sanitizer.
//!
//! Raw client payloads are untrusted JSON. The sanitizer walks the schema's
//! fields in order, coerces each present field per its kind, drops fields
//! the schema does not name, and wraps the result under the intent name.
//! Coercion is deliberately permissive everywhere except numeric text: a
//! misspelled number is an error, a weird string is just a string.

use serde_json::{Map, Value};

use contracts::{
    FieldKind, IntentSchema, RejectionReason, BODY_PARTS, USER_STRING_MAX, USER_TEXT_MAX,
};
use std::collections::BTreeMap;

/// Sanitizes one raw payload against the named schema in `schemas`.
///
/// With `force_array`, or when the payload already is an array, the output
/// body is an array of sanitized objects; a bare object is promoted to a
/// one-element array. The result is always `{intent_name: body}`.
pub fn sanitize(
    schemas: &BTreeMap<String, IntentSchema>,
    name: &str,
    payload: &Value,
    force_array: bool,
) -> Result<Value, RejectionReason> {
    let schema = schemas.get(name).ok_or_else(|| RejectionReason::UnknownIntent {
        name: name.to_string(),
    })?;
    sanitize_with(schema, payload, force_array)
}

/// Sanitizes against an already-resolved schema.
pub fn sanitize_with(
    schema: &IntentSchema,
    payload: &Value,
    force_array: bool,
) -> Result<Value, RejectionReason> {
    let body = if force_array || payload.is_array() {
        let items: Vec<&Value> = match payload {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut sanitized = Vec::with_capacity(items.len());
        for item in items {
            sanitized.push(Value::Object(sanitize_object(schema, item)?));
        }
        Value::Array(sanitized)
    } else {
        Value::Object(sanitize_object(schema, payload)?)
    };

    let mut record = Map::new();
    record.insert(schema.name.clone(), body);
    Ok(Value::Object(record))
}

fn sanitize_object(
    schema: &IntentSchema,
    payload: &Value,
) -> Result<Map<String, Value>, RejectionReason> {
    let mut out = Map::new();
    for field in &schema.fields {
        let raw = payload
            .get(field.name.as_str())
            .ok_or_else(|| RejectionReason::MissingField {
                field: field.name.clone(),
            })?;
        out.insert(field.name.clone(), coerce(field.kind, &field.name, raw)?);
    }
    Ok(out)
}

fn coerce(kind: FieldKind, field: &str, raw: &Value) -> Result<Value, RejectionReason> {
    let value = match kind {
        FieldKind::String => Value::String(stringy(raw)),
        FieldKind::Int => Value::from(require_int(field, raw)?),
        FieldKind::Price => {
            let amount = require_f64(field, raw)?;
            Value::from((amount * 1_000.0).round() as i64)
        }
        FieldKind::Bool => Value::Bool(truthy(raw)),
        FieldKind::StringArray => {
            let items: Vec<Value> = match raw {
                Value::Array(items) => items
                    .iter()
                    .filter(|item| !matches!(item, Value::Array(_) | Value::Object(_)))
                    .map(|item| Value::String(stringy(item)))
                    .collect(),
                Value::Null => Vec::new(),
                single => vec![Value::String(stringy(single))],
            };
            Value::Array(items)
        }
        FieldKind::IntArray => {
            let items: Vec<Value> = match raw {
                Value::Array(items) => {
                    items.iter().filter_map(lenient_int).map(Value::from).collect()
                }
                single => lenient_int(single).map(Value::from).into_iter().collect(),
            };
            Value::Array(items)
        }
        FieldKind::BodyPartArray => {
            let items: Vec<Value> = match raw {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|part| BODY_PARTS.contains(part))
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
                _ => Vec::new(),
            };
            Value::Array(items)
        }
        FieldKind::UserString => Value::String(truncate_chars(stringy(raw), USER_STRING_MAX)),
        FieldKind::UserText => Value::String(truncate_chars(stringy(raw), USER_TEXT_MAX)),
    };
    Ok(value)
}

/// Display form of a scalar. Null and composites collapse to empty: the
/// simulation treats empty as absent.
fn stringy(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Numbers and numeric text only; fractional values truncate toward zero.
fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|f| f.is_finite()),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn require_int(field: &str, value: &Value) -> Result<i64, RejectionReason> {
    lenient_int(value).ok_or_else(|| RejectionReason::InvalidNumber {
        field: field.to_string(),
    })
}

fn require_f64(field: &str, value: &Value) -> Result<f64, RejectionReason> {
    lenient_f64(value).ok_or_else(|| RejectionReason::InvalidNumber {
        field: field.to_string(),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truncate_chars(value: String, max: usize) -> String {
    if value.chars().count() <= max {
        value
    } else {
        value.chars().take(max).collect()
    }
}
