//! The closed component registry.
//!
//! Exactly eight components exist. Each variant carries its prop schema,
//! default props, and sanitizer in one exhaustive mapping, so "unknown
//! component" can only arise at the untyped-JSON validation boundary, never
//! inside the typed tree.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::{NodeKind, UiNode, UiTree};

/// The eight whitelisted components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Button,
    Card,
    Input,
    Table,
    Modal,
    Sidebar,
    Navbar,
    Chart,
}

/// Declared type of a prop value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    Str,
    Bool,
    StrList,
    NumList,
    StrMatrix,
    Variant(&'static [&'static str]),
}

impl PropType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            PropType::Str => value.is_string(),
            PropType::Bool => value.is_boolean(),
            PropType::StrList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            PropType::NumList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_number)),
            PropType::StrMatrix => value.as_array().is_some_and(|rows| {
                rows.iter().all(|row| {
                    row.as_array()
                        .is_some_and(|cells| cells.iter().all(Value::is_string))
                })
            }),
            PropType::Variant(allowed) => value
                .as_str()
                .is_some_and(|s| allowed.contains(&s)),
        }
    }

    /// Type token used in validation messages, e.g. `string[]`.
    pub fn expected(&self) -> &'static str {
        match self {
            PropType::Str => "string",
            PropType::Bool => "boolean",
            PropType::StrList => "string[]",
            PropType::NumList => "number[]",
            PropType::StrMatrix => "string[][]",
            PropType::Variant(_) => "enum",
        }
    }
}

/// Required/optional prop keys with their type rules.
pub struct PropSchema {
    pub required: &'static [(&'static str, PropType)],
    pub optional: &'static [(&'static str, PropType)],
}

impl PropSchema {
    pub fn rule_for(&self, key: &str) -> Option<PropType> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .find(|(name, _)| *name == key)
            .map(|(_, rule)| *rule)
    }

    pub fn allows(&self, key: &str) -> bool {
        self.rule_for(key).is_some()
    }

    /// All schema keys, required first, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = (&'static str, PropType)> + '_ {
        self.required.iter().chain(self.optional.iter()).copied()
    }
}

const BUTTON_SCHEMA: PropSchema = PropSchema {
    required: &[("label", PropType::Str)],
    optional: &[("variant", PropType::Variant(&["primary", "secondary"]))],
};

const CARD_SCHEMA: PropSchema = PropSchema {
    required: &[("title", PropType::Str), ("body", PropType::Str)],
    optional: &[("footer", PropType::Str)],
};

const INPUT_SCHEMA: PropSchema = PropSchema {
    required: &[("label", PropType::Str), ("placeholder", PropType::Str)],
    optional: &[("value", PropType::Str)],
};

const TABLE_SCHEMA: PropSchema = PropSchema {
    required: &[("columns", PropType::StrList), ("rows", PropType::StrMatrix)],
    optional: &[],
};

const MODAL_SCHEMA: PropSchema = PropSchema {
    required: &[("title", PropType::Str), ("body", PropType::Str)],
    optional: &[("open", PropType::Bool), ("confirmLabel", PropType::Str)],
};

const SIDEBAR_SCHEMA: PropSchema = PropSchema {
    required: &[("title", PropType::Str), ("items", PropType::StrList)],
    optional: &[],
};

const NAVBAR_SCHEMA: PropSchema = PropSchema {
    required: &[("title", PropType::Str), ("links", PropType::StrList)],
    optional: &[],
};

const CHART_SCHEMA: PropSchema = PropSchema {
    required: &[
        ("title", PropType::Str),
        ("points", PropType::NumList),
        ("labels", PropType::StrList),
    ],
    optional: &[],
};

/// Keyword cues for inferring a component from free text, in tie-break
/// priority order. First match wins per category; several categories can
/// match at once.
const COMPONENT_CUES: &[(&[&str], ComponentKind)] = &[
    (&["modal"], ComponentKind::Modal),
    (&["table"], ComponentKind::Table),
    (&["input", "form"], ComponentKind::Input),
    (&["chart", "graph"], ComponentKind::Chart),
    (&["sidebar"], ComponentKind::Sidebar),
    (&["navbar", "header"], ComponentKind::Navbar),
    (&["button", "cta"], ComponentKind::Button),
];

impl ComponentKind {
    pub const ALL: [ComponentKind; 8] = [
        ComponentKind::Button,
        ComponentKind::Card,
        ComponentKind::Input,
        ComponentKind::Table,
        ComponentKind::Modal,
        ComponentKind::Sidebar,
        ComponentKind::Navbar,
        ComponentKind::Chart,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Button => "Button",
            ComponentKind::Card => "Card",
            ComponentKind::Input => "Input",
            ComponentKind::Table => "Table",
            ComponentKind::Modal => "Modal",
            ComponentKind::Sidebar => "Sidebar",
            ComponentKind::Navbar => "Navbar",
            ComponentKind::Chart => "Chart",
        }
    }

    /// Exact-name lookup against the registry.
    pub fn from_name(name: &str) -> Option<ComponentKind> {
        ComponentKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Case-insensitive lookup, for the lowercase type segment of
    /// positional targets such as `content:card:2`.
    pub fn from_name_ci(name: &str) -> Option<ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    pub fn names() -> [&'static str; 8] {
        ComponentKind::ALL.map(|kind| kind.name())
    }

    pub fn schema(&self) -> &'static PropSchema {
        match self {
            ComponentKind::Button => &BUTTON_SCHEMA,
            ComponentKind::Card => &CARD_SCHEMA,
            ComponentKind::Input => &INPUT_SCHEMA,
            ComponentKind::Table => &TABLE_SCHEMA,
            ComponentKind::Modal => &MODAL_SCHEMA,
            ComponentKind::Sidebar => &SIDEBAR_SCHEMA,
            ComponentKind::Navbar => &NAVBAR_SCHEMA,
            ComponentKind::Chart => &CHART_SCHEMA,
        }
    }

    /// Default props for heuristic plans. `intent` seeds the Card body
    /// (first 80 chars).
    pub fn default_props(&self, intent: &str) -> Map<String, Value> {
        let summary: String = intent.trim().chars().take(80).collect();
        match self {
            ComponentKind::Button => prop_map([
                ("label", json!("Save Changes")),
                ("variant", json!("primary")),
            ]),
            ComponentKind::Card => prop_map([
                ("title", json!("New Section")),
                (
                    "body",
                    if summary.is_empty() {
                        json!("Generated from your intent.")
                    } else {
                        json!(summary)
                    },
                ),
                ("footer", json!("Generated from latest instruction")),
            ]),
            ComponentKind::Input => prop_map([
                ("label", json!("Search")),
                ("placeholder", json!("Type here...")),
                ("value", json!("")),
            ]),
            ComponentKind::Table => prop_map([
                ("columns", json!(["Name", "Status", "Owner"])),
                (
                    "rows",
                    json!([["Alpha", "Active", "Ops"], ["Beta", "Paused", "Finance"]]),
                ),
            ]),
            ComponentKind::Modal => prop_map([
                ("title", json!("Settings")),
                ("body", json!("Adjust key preferences for this workspace.")),
                ("open", json!(true)),
                ("confirmLabel", json!("Apply")),
            ]),
            ComponentKind::Sidebar => prop_map([
                ("title", json!("Quick Links")),
                ("items", json!(["Overview", "Usage", "Settings"])),
            ]),
            ComponentKind::Navbar => prop_map([
                ("title", json!("Workspace")),
                ("links", json!(["Home", "Reports", "Settings"])),
            ]),
            ComponentKind::Chart => prop_map([
                ("title", json!("Usage")),
                ("points", json!([12, 18, 11, 24, 16, 28])),
                ("labels", json!(["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"])),
            ]),
        }
    }

    /// Coerce raw props toward the canonical schema. Unknown keys are
    /// dropped; values that cannot be coerced are dropped rather than stored
    /// malformed.
    pub fn sanitize_props(&self, raw: &Map<String, Value>) -> Map<String, Value> {
        let mut source = raw.clone();
        if let ComponentKind::Chart = self {
            expand_chart_pairs(&mut source);
        }

        let mut out = Map::new();
        for (key, rule) in self.schema().keys() {
            let Some(value) = source.get(key) else {
                continue;
            };
            let clean = match rule {
                PropType::Str => sanitize_string(value),
                PropType::Bool => value.as_bool().map(Value::Bool),
                PropType::StrList => sanitize_string_list(value),
                PropType::NumList => sanitize_number_list(value),
                PropType::StrMatrix => {
                    let columns = string_list_of(source.get("columns"));
                    sanitize_rows(value, &columns)
                }
                PropType::Variant(allowed) => value
                    .as_str()
                    .map(str::trim)
                    .filter(|s| allowed.contains(s))
                    .map(|s| Value::String(s.to_string())),
            };
            if let Some(clean) = clean {
                out.insert(key.to_string(), clean);
            }
        }

        if let ComponentKind::Chart = self {
            truncate_chart_series(&mut out);
        }
        out
    }
}

fn prop_map<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn sanitize_string(value: &Value) -> Option<Value> {
    let trimmed = value.as_str()?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(Value::String(trimmed.to_string()))
}

/// Coerce one list item to a string: strings trimmed, numbers rendered,
/// objects projected through label/name/title/key.
fn string_from_item(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => ["label", "name", "title", "key"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn sanitize_string_list(value: &Value) -> Option<Value> {
    let items = value.as_array()?;
    Some(Value::Array(
        items
            .iter()
            .filter_map(string_from_item)
            .map(Value::String)
            .collect(),
    ))
}

fn sanitize_number_list(value: &Value) -> Option<Value> {
    let items = value.as_array()?;
    Some(Value::Array(
        items.iter().filter(|v| v.is_number()).cloned().collect(),
    ))
}

fn string_list_of(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(string_from_item).collect())
        .unwrap_or_default()
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Rows arrive either as arrays of cells or as objects projected onto the
/// column names (case-insensitive key fallback).
fn sanitize_rows(value: &Value, columns: &[String]) -> Option<Value> {
    let raw_rows = value.as_array()?;
    let mut rows = Vec::new();
    for row in raw_rows {
        match row {
            Value::Array(cells) => rows.push(Value::Array(
                cells
                    .iter()
                    .map(|cell| Value::String(cell_to_string(cell)))
                    .collect(),
            )),
            Value::Object(fields) => {
                if columns.is_empty() {
                    continue;
                }
                let cells = columns
                    .iter()
                    .map(|column| {
                        let found = fields.get(column).or_else(|| {
                            fields
                                .iter()
                                .find(|(key, _)| key.eq_ignore_ascii_case(column))
                                .map(|(_, v)| v)
                        });
                        Value::String(found.map(cell_to_string).unwrap_or_default())
                    })
                    .collect();
                rows.push(Value::Array(cells));
            }
            _ => {}
        }
    }
    Some(Value::Array(rows))
}

/// Accept chart series given as `[{label, value}, …]` under either key:
/// split the pairs into parallel `points`/`labels` before per-key handling.
fn expand_chart_pairs(source: &mut Map<String, Value>) {
    let pairs = ["points", "labels"].iter().find_map(|key| {
        let items = source.get(*key)?.as_array()?;
        if items.is_empty() || !items.iter().all(Value::is_object) {
            return None;
        }
        Some(items.clone())
    });
    let Some(pairs) = pairs else {
        return;
    };

    let mut points = Vec::new();
    let mut labels = Vec::new();
    for pair in &pairs {
        let Some(obj) = pair.as_object() else {
            continue;
        };
        let value = obj.get("value").filter(|v| v.is_number());
        let label = obj.get("label").and_then(string_from_item);
        if let (Some(value), Some(label)) = (value, label) {
            points.push(value.clone());
            labels.push(Value::String(label));
        }
    }
    source.insert("points".to_string(), Value::Array(points));
    source.insert("labels".to_string(), Value::Array(labels));
}

/// Mismatched series lengths are truncated to the shorter one.
fn truncate_chart_series(props: &mut Map<String, Value>) {
    let points_len = props.get("points").and_then(Value::as_array).map(Vec::len);
    let labels_len = props.get("labels").and_then(Value::as_array).map(Vec::len);
    let (Some(points_len), Some(labels_len)) = (points_len, labels_len) else {
        return;
    };
    let keep = points_len.min(labels_len);
    for key in ["points", "labels"] {
        if let Some(Value::Array(items)) = props.get_mut(key) {
            items.truncate(keep);
        }
    }
}

/// Infer the single most likely component for a piece of text.
pub fn infer_component(text: &str) -> ComponentKind {
    infer_component_list(text)
        .into_iter()
        .next()
        .unwrap_or(ComponentKind::Card)
}

/// All components whose cues appear in the text, in priority order.
pub fn infer_component_list(text: &str) -> Vec<ComponentKind> {
    let lower = text.to_lowercase();
    COMPONENT_CUES
        .iter()
        .filter(|(cues, _)| cues.iter().any(|cue| lower.contains(cue)))
        .map(|(_, kind)| *kind)
        .collect()
}

/// The fixed starting layout: page → navbar + layout(sidebar + content).
/// The content node is always `root.children[1].children[1]`.
pub fn default_tree() -> UiNode {
    UiNode::new("page_root", NodeKind::Page)
        .with_props(prop_map([("className", json!("generated-page"))]))
        .with_children(vec![
            UiNode::new("navbar_main", NodeKind::Widget(ComponentKind::Navbar)).with_props(
                prop_map([
                    ("title", json!("Generated Workspace")),
                    ("links", json!(["Overview", "Analytics", "Settings"])),
                ]),
            ),
            UiNode::new("layout_main", NodeKind::Layout)
                .with_props(prop_map([("className", json!("generated-main"))]))
                .with_children(vec![
                    UiNode::new("sidebar_main", NodeKind::Widget(ComponentKind::Sidebar))
                        .with_props(prop_map([
                            ("title", json!("Menu")),
                            ("items", json!(["Dashboard", "Reports", "Team", "Billing"])),
                        ])),
                    UiNode::new("content_main", NodeKind::Layout)
                        .with_props(prop_map([("className", json!("generated-content"))]))
                        .with_children(vec![UiNode::new(
                            "card_welcome",
                            NodeKind::Widget(ComponentKind::Card),
                        )
                        .with_props(prop_map([
                            ("title", json!("Welcome")),
                            (
                                "body",
                                json!("Describe your UI in the chat to iterate this screen."),
                            ),
                            ("footer", json!("Deterministic components only")),
                        ]))]),
                ]),
        ])
}

pub fn default_ui_tree() -> UiTree {
    UiTree::new(default_tree())
}
