//! Plan shape validation for oracle output.
//!
//! Runs on the raw plan value before clamping, so a malformed operation
//! type or an off-registry component rejects the plan instead of being
//! silently coerced.

use serde_json::Value;

use crate::registry::ComponentKind;

/// Check a raw plan value. `Err` carries the first violation.
pub fn validate_plan(plan: &Value) -> Result<(), String> {
    let Some(obj) = plan.as_object() else {
        return Err("Plan must be an object.".to_string());
    };

    let Some(operations) = obj.get("operations").and_then(Value::as_array) else {
        return Err("Plan.operations must be an array.".to_string());
    };

    for op in operations {
        let Some(op) = op.as_object() else {
            return Err("Invalid operation in plan.".to_string());
        };
        let op_type = op.get("type").and_then(Value::as_str).unwrap_or("");
        if !matches!(op_type, "add" | "update" | "remove") {
            return Err(format!("Unsupported operation type: {op_type}"));
        }
        if let Some(component) = op.get("component").and_then(Value::as_str) {
            if !component.is_empty() && ComponentKind::from_name(component).is_none() {
                return Err(format!("Plan uses non-whitelisted component: {component}"));
            }
        }
    }

    Ok(())
}
