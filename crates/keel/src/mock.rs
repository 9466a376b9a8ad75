//! Mock data for routes flagged `mockApi`.
//!
//! Produces a deterministic value that validates against a draft-07 schema:
//! every property (required or not) is filled in, arrays get one element,
//! `enum`/`const` pick their first value and string formats get a sample in
//! that format.

use serde_json::{json, Map, Value};

const MAX_DEPTH: usize = 16;

/// Generates data for `schema`, resolving `$ref`s against `definitions`.
pub fn generate(schema: &Value, definitions: &Map<String, Value>) -> Value {
    value_for(schema, definitions, 0)
}

fn value_for(schema: &Value, definitions: &Map<String, Value>, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::Null;
    }
    let Some(schema) = schema.as_object() else {
        // `true` / `{}` accept anything
        return Value::Null;
    };

    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        let name = reference.trim_start_matches("#/definitions/");
        return match definitions.get(name) {
            Some(target) => value_for(target, definitions, depth + 1),
            None => Value::Null,
        };
    }
    if let Some(value) = schema.get("const") {
        return value.clone();
    }
    if let Some(first) = schema.get("enum").and_then(Value::as_array).and_then(|v| v.first()) {
        return first.clone();
    }
    for key in ["anyOf", "oneOf"] {
        if let Some(first) = schema.get(key).and_then(Value::as_array).and_then(|v| v.first()) {
            return value_for(first, definitions, depth + 1);
        }
    }

    let ty = match schema.get("type") {
        Some(Value::String(ty)) => ty.as_str(),
        // ["string", "null"] and the like
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).find(|t| *t != "null").unwrap_or("null"),
        _ if schema.contains_key("properties") => "object",
        _ => return Value::Null,
    };

    match ty {
        "string" => string_for(schema.get("format").and_then(Value::as_str)),
        "number" => json!(3.14),
        "integer" => json!(42),
        "boolean" => json!(true),
        "null" => Value::Null,
        "array" => array_for(schema, definitions, depth),
        "object" => object_for(schema, definitions, depth),
        _ => Value::Null,
    }
}

fn string_for(format: Option<&str>) -> Value {
    let sample = match format {
        Some("date-time") => "2024-01-01T00:00:00Z",
        Some("date") => "2024-01-01",
        Some("time") => "00:00:00Z",
        Some("email") => "user@example.com",
        Some("uri") | Some("url") => "https://example.com",
        Some("uuid") => "00000000-0000-4000-8000-000000000000",
        Some("ipv4") => "127.0.0.1",
        _ => "example",
    };
    Value::String(sample.to_string())
}

fn array_for(schema: &Map<String, Value>, definitions: &Map<String, Value>, depth: usize) -> Value {
    match schema.get("items") {
        // tuple
        Some(Value::Array(items)) => Value::Array(items.iter().map(|s| value_for(s, definitions, depth + 1)).collect()),
        Some(items) => Value::Array(vec![value_for(items, definitions, depth + 1)]),
        None => Value::Array(Vec::new()),
    }
}

fn object_for(schema: &Map<String, Value>, definitions: &Map<String, Value>, depth: usize) -> Value {
    let mut object = Map::new();
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            object.insert(name.clone(), value_for(property, definitions, depth + 1));
        }
    }
    Value::Object(object)
}
