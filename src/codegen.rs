//! Deterministic emission of the restricted UI-construction source.
//!
//! The output is exactly what the code validator accepts: a single
//! `renderGeneratedUI(React, components)` function returning nested
//! `React.createElement` calls. Structural nodes render as `"div"` elements
//! carrying their className; component leaves render with their sanitized
//! props as pretty-printed JSON. Same tree in, same bytes out.

use serde_json::Value;

use crate::registry::ComponentKind;
use crate::types::{NodeKind, UiNode, UiTree};

fn quoted(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn render_props(props: &serde_json::Map<String, Value>) -> String {
    serde_json::to_string_pretty(&Value::Object(props.clone()))
        .unwrap_or_else(|_| "{}".to_string())
}

fn structural_class_name(node: &UiNode) -> &str {
    node.props
        .get("className")
        .and_then(Value::as_str)
        .unwrap_or(match node.component {
            NodeKind::Page => "generated-page",
            _ => "generated-content",
        })
}

fn node_to_code(node: &UiNode, depth: usize) -> String {
    let indent = "  ".repeat(depth);

    if node.component.is_structural() {
        let class_name = structural_class_name(node);
        let children: Vec<String> = node
            .children
            .iter()
            .map(|child| node_to_code(child, depth + 1))
            .collect();
        let children = children.join(",\n");
        if children.is_empty() {
            return format!(
                "{indent}React.createElement(\"div\", {{ className: {} }})",
                quoted(class_name)
            );
        }
        return format!(
            "{indent}React.createElement(\"div\", {{ className: {} }},\n{children}\n{indent})",
            quoted(class_name)
        );
    }

    format!(
        "{indent}React.createElement({}, {})",
        node.component.name(),
        render_props(&node.props)
    )
}

/// Render the whole tree into validator-acceptable source.
pub fn render_generated_ui(tree: &UiTree) -> String {
    let destructured = ComponentKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ");
    let body = node_to_code(&tree.root, 2);
    format!(
        "function renderGeneratedUI(React, components) {{\n  const {{ {destructured} }} = components;\n  return (\n{body}\n  );\n}}"
    )
}
