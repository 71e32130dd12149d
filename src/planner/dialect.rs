//! Lowering for the bucketed modify-plan dialect.
//!
//! Edit-mode oracle prompts ask for `updates`/`additions`/`removals`/
//! `layout_changes` buckets rather than a flat operation list. This pass
//! rewrites a bucketed plan into the flat shape the canonicalizer expects.
//! The buckets themselves stay on the object so they survive into plan
//! metadata. A plan without any bucket key passes through untouched.

use serde_json::{json, Map, Value};

const BUCKET_KEYS: [&str; 4] = ["updates", "additions", "removals", "layout_changes"];

/// True when the value carries at least one dialect bucket.
pub fn looks_like_modify_dialect(raw: &Value) -> bool {
    raw.as_object().map_or(false, |obj| {
        BUCKET_KEYS
            .iter()
            .any(|key| obj.get(*key).map_or(false, Value::is_array))
    })
}

fn bucket_items<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn str_field(item: &Map<String, Value>, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn id_target(item: &Map<String, Value>) -> Option<String> {
    str_field(item, "id").map(|id| format!("id:{id}"))
}

fn lowered_op(
    item: &Map<String, Value>,
    op_type: &str,
    target: String,
    component: Option<String>,
    props: Value,
    position: String,
) -> Value {
    json!({
        "id": str_field(item, "id"),
        "type": op_type,
        "target": target,
        "component": component,
        "props": props,
        "position": position,
    })
}

fn item_props(item: &Map<String, Value>) -> Value {
    item.get("props")
        .filter(|value| value.is_object())
        .cloned()
        .unwrap_or_else(|| json!({}))
}

/// Rewrite the four buckets into one flat operation list, replacing any
/// `operations` the raw plan carried. Non-object bucket entries are dropped.
pub fn lower_modify_dialect(raw: &Value) -> Value {
    let Some(obj) = raw.as_object() else {
        return raw.clone();
    };
    if !looks_like_modify_dialect(raw) {
        return raw.clone();
    }

    let mut operations: Vec<Value> = Vec::new();

    for item in bucket_items(obj, "updates") {
        let target = str_field(item, "target")
            .or_else(|| id_target(item))
            .unwrap_or_else(|| "content:last".to_string());
        let position = str_field(item, "position").unwrap_or_else(|| "replace".to_string());
        operations.push(lowered_op(
            item,
            "update",
            target,
            str_field(item, "component"),
            item_props(item),
            position,
        ));
    }

    for item in bucket_items(obj, "additions") {
        let target = str_field(item, "target")
            .or_else(|| id_target(item))
            .unwrap_or_else(|| "content".to_string());
        operations.push(lowered_op(
            item,
            "add",
            target,
            str_field(item, "component"),
            item_props(item),
            "append".to_string(),
        ));
    }

    for item in bucket_items(obj, "removals") {
        let target = str_field(item, "target")
            .or_else(|| id_target(item))
            .unwrap_or_else(|| "content:last".to_string());
        operations.push(lowered_op(item, "remove", target, None, json!({}), "append".to_string()));
    }

    for item in bucket_items(obj, "layout_changes") {
        let Some(target) = str_field(item, "target") else {
            continue;
        };
        if target != "navbar" && target != "sidebar" {
            continue;
        }
        let component = str_field(item, "component").unwrap_or_else(|| {
            if target == "navbar" { "Navbar" } else { "Sidebar" }.to_string()
        });
        operations.push(lowered_op(
            item,
            "update",
            target,
            Some(component),
            item_props(item),
            "replace".to_string(),
        ));
    }

    let mut out = obj.clone();
    out.insert("action".to_string(), json!("modify"));
    out.insert("title".to_string(), json!("Incremental UI update"));
    let reasoning = obj.get("reasoning").and_then(Value::as_str).unwrap_or("");
    out.insert("reasoning".to_string(), json!(reasoning));
    out.insert(
        "notes".to_string(),
        json!(["Strict incremental planner output was normalized to deterministic operations."]),
    );
    out.insert("operations".to_string(), Value::Array(operations));
    Value::Object(out)
}
