//! Plan canonicalizer.
//!
//! Forces any raw plan value into one comparison-stable shape: clamped
//! operation fields, deep-key-sorted props with collapsed string leaves, a
//! total operation order from a composite priority key, and trimmed
//! metadata. Canonicalization is idempotent and insensitive to the input
//! order of operations, so two semantically-equal plans serialize to
//! identical bytes regardless of source.

use itertools::Itertools;
use serde_json::{Map, Value};

use crate::types::{OpType, Operation, Plan, Position};

/// Top-level keys that never survive canonicalization.
const NONDETERMINISTIC_KEYS: [&str; 4] = ["operations", "random", "seed", "timestamp"];

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_primitive(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_text(s)),
        other => other.clone(),
    }
}

/// Recursively sort object keys and collapse whitespace in string leaves.
pub fn deep_sort_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(deep_sort_value).collect()),
        Value::Object(fields) => Value::Object(deep_sort_map(fields)),
        other => normalize_primitive(other),
    }
}

fn deep_sort_map(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), deep_sort_value(value)))
        .collect()
}

/// Clamp one raw operation into canonical shape. Invalid or missing fields
/// take their deterministic defaults rather than failing.
pub fn clean_operation(raw: &Value) -> Operation {
    let get = |key: &str| raw.as_object().and_then(|obj| obj.get(key));

    Operation {
        id: get("id").and_then(Value::as_str).map(str::to_string),
        op_type: get("type")
            .and_then(Value::as_str)
            .and_then(OpType::from_str_loose)
            .unwrap_or(OpType::Update),
        target: get("target")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "content:last".to_string()),
        component: get("component").and_then(Value::as_str).map(str::to_string),
        props: match get("props") {
            Some(Value::Object(props)) => deep_sort_map(props),
            _ => Map::new(),
        },
        position: get("position")
            .and_then(Value::as_str)
            .and_then(Position::from_str_loose)
            .unwrap_or(Position::Append),
    }
}

/// Structural slots sort before generic content so singleton merges land
/// before positional edits. Unknown targets share the lowest priority.
fn target_priority(target: &str) -> u8 {
    match target {
        "navbar" => 0,
        "sidebar" => 1,
        "content:first" => 2,
        "content" => 3,
        "content:last" => 4,
        _ => 9,
    }
}

fn operation_sort_key(op: &Operation) -> String {
    let props_json =
        serde_json::to_string(&Value::Object(op.props.clone())).unwrap_or_default();
    format!(
        "{}|{}|{}|{}|{}|{}",
        op.op_type.priority(),
        target_priority(&op.target),
        op.component.as_deref().unwrap_or(""),
        op.id.as_deref().unwrap_or(""),
        op.position.as_str(),
        props_json
    )
}

/// Stable sort: equal keys keep their input order.
fn stable_sort_operations(operations: Vec<Operation>) -> Vec<Operation> {
    operations
        .into_iter()
        .sorted_by_cached_key(operation_sort_key)
        .collect()
}

/// Canonicalize a raw plan value from any source.
pub fn canonicalize(raw: &Value) -> Plan {
    let base = match raw.as_object() {
        Some(obj) => obj.clone(),
        None => Map::new(),
    };

    let operations = base
        .get("operations")
        .and_then(Value::as_array)
        .map(|ops| ops.iter().map(clean_operation).collect())
        .unwrap_or_default();

    let title = base
        .get("title")
        .and_then(Value::as_str)
        .map(normalize_text)
        .unwrap_or_default();
    let reasoning = base
        .get("reasoning")
        .and_then(Value::as_str)
        .map(normalize_text)
        .unwrap_or_default();

    let mut notes: Vec<String> = base
        .get("notes")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(normalize_text(s)),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|note| !note.is_empty())
                .collect()
        })
        .unwrap_or_default();
    notes.sort();
    notes.dedup();

    let metadata: Map<String, Value> = base
        .iter()
        .filter(|(key, _)| {
            !NONDETERMINISTIC_KEYS.contains(&key.as_str())
                && !matches!(key.as_str(), "title" | "reasoning" | "notes")
        })
        .map(|(key, value)| (key.clone(), deep_sort_value(value)))
        .collect();

    Plan {
        title,
        reasoning,
        notes,
        operations: stable_sort_operations(operations),
        metadata,
    }
}
