//! Tool argument validation against the declared JSON Schema.
//!
//! Supports the subset the tools declare: `type`, `properties`,
//! `required`, `additionalProperties: false`, `enum`, `items`,
//! `minimum`/`maximum` and `default`. Nested objects and arrays are
//! checked recursively; error messages name the offending field path.

use anyhow::{bail, Result};
use serde_json::{Map, Value};

/// Validate `params` against `schema`, returning the parameters with
/// defaults filled in.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params = match params {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    if !params.is_object() {
        bail!("parameters must be a JSON object, got {}", json_type_name(&params));
    }
    check_value(schema, &params, "")
}

fn field_name(path: &str) -> &str {
    if path.is_empty() {
        "parameters"
    } else {
        path
    }
}

fn check_value(schema: &Value, value: &Value, path: &str) -> Result<Value> {
    if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
        let type_ok = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !type_ok {
            bail!(
                "parameter '{}' must be of type '{}', got {}",
                field_name(path),
                expected,
                json_type_name(value)
            );
        }
    }

    if let Some(enum_values) = schema.get("enum").and_then(|e| e.as_array()) {
        if !enum_values.contains(value) {
            let allowed: Vec<String> = enum_values.iter().map(|v| v.to_string()).collect();
            bail!(
                "parameter '{}' must be one of [{}], got {}",
                field_name(path),
                allowed.join(", "),
                value
            );
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(|m| m.as_f64()) {
            if n < min {
                bail!("parameter '{}' must be >= {}, got {}", field_name(path), min, n);
            }
        }
        if let Some(max) = schema.get("maximum").and_then(|m| m.as_f64()) {
            if n > max {
                bail!("parameter '{}' must be <= {}, got {}", field_name(path), max, n);
            }
        }
    }

    match value {
        Value::Object(obj) => check_object(schema, obj, path),
        Value::Array(items) => {
            let Some(item_schema) = schema.get("items") else {
                return Ok(value.clone());
            };
            let checked = items
                .iter()
                .enumerate()
                .map(|(i, item)| check_value(item_schema, item, &format!("{}[{}]", field_name(path), i)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(checked))
        }
        _ => Ok(value.clone()),
    }
}

fn check_object(schema: &Value, obj: &Map<String, Value>, path: &str) -> Result<Value> {
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .unwrap_or(&empty);
    let join = |name: &str| {
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", path, name)
        }
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|v| v.as_str()) {
            if !obj.contains_key(field) {
                bail!("missing required parameter: {}", join(field));
            }
        }
    }

    let closed = schema
        .get("additionalProperties")
        .map(|a| a == &Value::Bool(false))
        .unwrap_or(false);
    if closed {
        if let Some(unknown) = obj.keys().find(|k| !properties.contains_key(*k)) {
            bail!("unknown parameter: {}", join(unknown));
        }
    }

    let mut result = obj.clone();
    for (name, prop_schema) in properties {
        match obj.get(name) {
            Some(value) => {
                let checked = check_value(prop_schema, value, &join(name))?;
                result.insert(name.clone(), checked);
            }
            None => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(name.clone(), default.clone());
                }
            }
        }
    }
    Ok(Value::Object(result))
}

/// Return the JSON type name for a value (used in error messages).
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
