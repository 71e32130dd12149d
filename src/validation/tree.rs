//! Tree and prop validation against the closed component registry.
//!
//! Two surfaces share the issue shape. [`validate_tree`] walks the typed
//! AST produced by the mutator; [`validate_legacy`] walks an untrusted
//! legacy-shape JSON value (the raw AST submitted to the validation
//! endpoint), where unknown component names and malformed nodes are
//! reachable.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::registry::{ComponentKind, PropType};
use crate::types::{UiNode, UiTree};

/// One structural violation, addressable to a component and prop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropIssue {
    pub component: String,
    pub prop: String,
    pub issue: String,
}

impl PropIssue {
    fn new(component: impl Into<String>, prop: impl Into<String>, issue: impl Into<String>) -> Self {
        PropIssue {
            component: component.into(),
            prop: prop.into(),
            issue: issue.into(),
        }
    }
}

/// `{valid, errors}` report, the shape the validation surfaces return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropValidation {
    pub valid: bool,
    pub errors: Vec<PropIssue>,
}

impl PropValidation {
    pub fn from_issues(issues: Vec<PropIssue>) -> Self {
        PropValidation {
            valid: issues.is_empty(),
            errors: issues,
        }
    }
}

fn check_widget_props(kind: ComponentKind, props: &Map<String, Value>, issues: &mut Vec<PropIssue>) {
    let schema = kind.schema();

    for (required, _) in schema.required {
        if !props.contains_key(*required) {
            issues.push(PropIssue::new(kind.name(), *required, "Missing required prop"));
        }
    }

    for (key, value) in props {
        let Some(rule) = schema.rule_for(key) else {
            issues.push(PropIssue::new(kind.name(), key, "Unknown prop"));
            continue;
        };
        if !rule.matches(value) {
            issues.push(PropIssue::new(kind.name(), key, "Invalid prop type"));
        }
    }
}

fn validate_node(node: &UiNode, issues: &mut Vec<PropIssue>) {
    match node.component.widget() {
        None => {
            for child in &node.children {
                validate_node(child, issues);
            }
        }
        Some(kind) => {
            check_widget_props(kind, &node.props, issues);
            if !node.children.is_empty() {
                issues.push(PropIssue::new(kind.name(), "children", "Nested component misuse"));
            }
        }
    }
}

/// Validate a typed tree. Empty result means valid.
pub fn validate_tree(tree: &UiTree) -> Vec<PropIssue> {
    let mut issues = Vec::new();
    validate_node(&tree.root, &mut issues);
    issues
}

fn legacy_type_rule_issue(kind: ComponentKind, key: &str, rule: PropType, value: &Value) -> Option<PropIssue> {
    if let PropType::Variant(allowed) = rule {
        if !rule.matches(value) {
            return Some(PropIssue::new(
                kind.name(),
                key,
                format!("Invalid prop value. Allowed: {}", allowed.join(", ")),
            ));
        }
        return None;
    }
    if !rule.matches(value) {
        return Some(PropIssue::new(
            kind.name(),
            key,
            format!("Invalid prop type. Expected {}", rule.expected()),
        ));
    }
    None
}

fn validate_legacy_node(node: &Value, issues: &mut Vec<PropIssue>) {
    let Some(obj) = node.as_object() else {
        return;
    };
    let node_type = obj.get("type").and_then(Value::as_str).unwrap_or("");

    if node_type == "page" || node_type == "layout" {
        let Some(children) = obj.get("children").and_then(Value::as_array) else {
            issues.push(PropIssue::new(
                node_type,
                "children",
                "Layout nodes must contain a children array",
            ));
            return;
        };
        for child in children {
            validate_legacy_node(child, issues);
        }
        return;
    }

    let Some(kind) = ComponentKind::from_name(node_type) else {
        let label = if node_type.is_empty() { "Unknown" } else { node_type };
        issues.push(PropIssue::new(label, "type", "Component is not in allowed registry"));
        return;
    };

    if obj
        .get("children")
        .and_then(Value::as_array)
        .map_or(false, |children| !children.is_empty())
    {
        issues.push(PropIssue::new(
            kind.name(),
            "children",
            "Nested component misuse: leaf components may not define children",
        ));
    }

    let empty = Map::new();
    let props = obj.get("props").and_then(Value::as_object).unwrap_or(&empty);
    let schema = kind.schema();

    for key in props.keys() {
        if !schema.allows(key) {
            issues.push(PropIssue::new(kind.name(), key, "Unknown prop"));
        }
    }

    for (required, _) in schema.required {
        if !props.contains_key(*required) {
            issues.push(PropIssue::new(kind.name(), *required, "Missing required prop"));
        }
    }

    for (key, rule) in schema.keys() {
        let Some(value) = props.get(key) else {
            continue;
        };
        if let Some(issue) = legacy_type_rule_issue(kind, key, rule, value) {
            issues.push(issue);
        }
    }

    if kind == ComponentKind::Chart {
        let points = props.get("points").and_then(Value::as_array);
        let labels = props.get("labels").and_then(Value::as_array);
        if let (Some(points), Some(labels)) = (points, labels) {
            if points.len() != labels.len() {
                issues.push(PropIssue::new(
                    kind.name(),
                    "props",
                    "points and labels must have the same length",
                ));
            }
        }
    }
}

/// Validate a raw legacy-shape AST value. Empty result means valid.
pub fn validate_legacy(node: &Value) -> Vec<PropIssue> {
    let mut issues = Vec::new();
    validate_legacy_node(node, &mut issues);
    issues
}
