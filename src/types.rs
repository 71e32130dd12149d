//! Core data model: UI trees, edit operations, plans, versions, sessions.
//!
//! The tree has one canonical in-memory form (`UiNode`) plus a legacy
//! serialization adapter (`from_legacy`/`to_legacy`); mutation code only ever
//! sees the canonical form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::TreeError;
use crate::registry::ComponentKind;

/// Unique identifier for a session
pub type SessionId = String;

/// Unique identifier for a version record
pub type VersionId = String;

/// Unique identifier for a tree node
pub type NodeId = String;

/// Build a prefixed identifier (`sess_…`, `ver_…`). The suffix is lowercase
/// hex so version ids always match the classifier's token pattern.
pub fn new_prefixed_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Kind of a tree node: a structural container or a registry component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Page,
    Layout,
    Widget(ComponentKind),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Page => "Page",
            NodeKind::Layout => "Layout",
            NodeKind::Widget(kind) => kind.name(),
        }
    }

    /// Parse a canonical-shape component name.
    pub fn from_name(name: &str) -> Option<NodeKind> {
        match name {
            "Page" => Some(NodeKind::Page),
            "Layout" => Some(NodeKind::Layout),
            other => ComponentKind::from_name(other).map(NodeKind::Widget),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, NodeKind::Page | NodeKind::Layout)
    }

    pub fn widget(&self) -> Option<ComponentKind> {
        match self {
            NodeKind::Widget(kind) => Some(*kind),
            _ => None,
        }
    }

    /// The legacy `type` field: lowercase for structural kinds, the registry
    /// name for components.
    pub fn legacy_type(&self) -> &'static str {
        match self {
            NodeKind::Page => "page",
            NodeKind::Layout => "layout",
            NodeKind::Widget(kind) => kind.name(),
        }
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodeKind::from_name(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown component kind: {raw}")))
    }
}

/// A node of the canonical UI tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    pub id: NodeId,
    pub component: NodeKind,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn new(id: impl Into<NodeId>, component: NodeKind) -> Self {
        Self {
            id: id.into(),
            component,
            props: Map::new(),
            children: Vec::new(),
        }
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }

    pub fn with_children(mut self, children: Vec<UiNode>) -> Self {
        self.children = children;
        self
    }

    /// Convert a legacy-shape JSON node (`{id, type, className?, props?,
    /// children?}`) into the canonical form. `className` folds into props;
    /// missing ids derive from the tree path; a missing `type` defaults to
    /// Card. Unknown component names are rejected.
    pub fn from_legacy(value: &Value, path: &str) -> Result<UiNode, TreeError> {
        let obj = value.as_object().ok_or(TreeError::NotAnObject)?;

        let raw_type = obj.get("type").and_then(Value::as_str).unwrap_or("");
        let component = match raw_type {
            "page" => NodeKind::Page,
            "layout" => NodeKind::Layout,
            "" => NodeKind::Widget(ComponentKind::Card),
            other => NodeKind::from_name(other)
                .ok_or_else(|| TreeError::UnknownComponent(other.to_string()))?,
        };

        let mut props = obj
            .get("props")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some(class_name) = obj.get("className").and_then(Value::as_str) {
            props.insert("className".to_string(), Value::String(class_name.to_string()));
        }

        let id = match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}_{}", path, component.name().to_lowercase()),
        };

        let mut children = Vec::new();
        if let Some(raw_children) = obj.get("children").and_then(Value::as_array) {
            for (index, child) in raw_children.iter().enumerate() {
                children.push(UiNode::from_legacy(child, &format!("{path}_{index}"))?);
            }
        }

        Ok(UiNode {
            id,
            component,
            props,
            children,
        })
    }

    /// Convert back to the legacy shape. Structural nodes surface
    /// `props.className` as the top-level `className` (with the historical
    /// defaults); component leaves keep their props inline.
    pub fn to_legacy(&self) -> Value {
        let children: Vec<Value> = self.children.iter().map(UiNode::to_legacy).collect();

        if self.component.is_structural() {
            let default_class = match self.component {
                NodeKind::Page => "generated-page",
                _ => "generated-content",
            };
            let class_name = self
                .props
                .get("className")
                .and_then(Value::as_str)
                .unwrap_or(default_class);
            return serde_json::json!({
                "id": self.id,
                "type": self.component.legacy_type(),
                "className": class_name,
                "children": children,
            });
        }

        serde_json::json!({
            "id": self.id,
            "type": self.component.legacy_type(),
            "props": Value::Object(self.props.clone()),
            "children": children,
        })
    }

    /// Total number of nodes in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(UiNode::count).sum::<usize>()
    }

    pub fn find(&self, id: &str) -> Option<&UiNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut UiNode> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(id))
    }

    pub fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.id.clone());
        for child in &self.children {
            child.collect_ids(out);
        }
    }

    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }
}

/// Canonical tree wrapper stored on version records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiTree {
    pub version: u32,
    pub root: UiNode,
}

impl UiTree {
    pub fn new(root: UiNode) -> Self {
        Self { version: 1, root }
    }

    pub fn from_legacy_value(value: &Value) -> Result<UiTree, TreeError> {
        Ok(UiTree::new(UiNode::from_legacy(value, "root")?))
    }

    pub fn to_legacy_value(&self) -> Value {
        self.root.to_legacy()
    }

    pub fn node_count(&self) -> usize {
        self.root.count()
    }
}

/// Operation verb, ordered by canonical priority (removals sort first so
/// they never fight freshly-added nodes for a position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Remove,
    Update,
    Add,
}

impl OpType {
    pub fn priority(&self) -> u8 {
        match self {
            OpType::Remove => 0,
            OpType::Update => 1,
            OpType::Add => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Remove => "remove",
            OpType::Update => "update",
            OpType::Add => "add",
        }
    }

    pub fn from_str_loose(raw: &str) -> Option<OpType> {
        match raw {
            "remove" => Some(OpType::Remove),
            "update" => Some(OpType::Update),
            "add" => Some(OpType::Add),
            _ => None,
        }
    }
}

/// Insertion position for add operations; `replace` is meaningful for
/// updates only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Prepend,
    Append,
    Replace,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Prepend => "prepend",
            Position::Append => "append",
            Position::Replace => "replace",
        }
    }

    pub fn from_str_loose(raw: &str) -> Option<Position> {
        match raw {
            "prepend" => Some(Position::Prepend),
            "append" => Some(Position::Append),
            "replace" => Some(Position::Replace),
            _ => None,
        }
    }
}

/// One canonical edit operation. `target` stays a raw string here; the
/// mutator parses it (selector grammar lives in `tree_ops`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub op_type: OpType,
    pub target: String,
    pub component: Option<String>,
    #[serde(default)]
    pub props: Map<String, Value>,
    pub position: Position,
}

impl Operation {
    pub fn new(op_type: OpType, target: impl Into<String>) -> Self {
        Self {
            id: None,
            op_type,
            target: target.into(),
            component: None,
            props: Map::new(),
            position: Position::Append,
        }
    }

    pub fn with_component(mut self, component: ComponentKind) -> Self {
        self.component = Some(component.name().to_string());
        self
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// The operation's component resolved against the closed registry.
    pub fn component_kind(&self) -> Option<ComponentKind> {
        self.component.as_deref().and_then(ComponentKind::from_name)
    }
}

/// A canonical plan: cleaned, ordered operations plus trimmed metadata.
/// Two semantically-equal plans serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Plan {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerSource {
    Llm,
    Heuristic,
    Manual,
}

impl PlannerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlannerSource::Llm => "llm",
            PlannerSource::Heuristic => "heuristic",
            PlannerSource::Manual => "manual",
        }
    }
}

/// Request mode. `Regenerate` plans like modify but mutates without
/// modify-mode conservatism. `ManualEdit` is never requested; it marks
/// versions created by direct code submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Generate,
    Modify,
    Regenerate,
    #[serde(rename = "manual-edit")]
    ManualEdit,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Generate => "generate",
            Mode::Modify => "modify",
            Mode::Regenerate => "regenerate",
            Mode::ManualEdit => "manual-edit",
        }
    }

    /// Anything other than an explicit modify/regenerate is a generate.
    pub fn parse_or_generate(raw: Option<&str>) -> Mode {
        match raw {
            Some("modify") => Mode::Modify,
            Some("regenerate") => Mode::Regenerate,
            _ => Mode::Generate,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, Mode::Modify | Mode::Regenerate)
    }
}

/// Immutable snapshot of one accepted generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: VersionId,
    pub created_at: DateTime<Utc>,
    pub parent_version_id: Option<VersionId>,
    pub intent: String,
    pub mode: Mode,
    pub planner_source: PlannerSource,
    pub plan: Plan,
    /// Legacy-shape tree, kept for consumers of the old wire format.
    pub ui_tree: Value,
    /// Canonical tree.
    pub ui_ast: UiTree,
    pub code: String,
    pub explanation: String,
}

/// One conversation's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub versions: Vec<VersionRecord>,
    pub current_version_id: Option<VersionId>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: new_prefixed_id("sess"),
            created_at: now,
            updated_at: now,
            versions: Vec::new(),
            current_version_id: None,
        }
    }

    pub fn current_version(&self) -> Option<&VersionRecord> {
        let current = self.current_version_id.as_deref()?;
        self.versions.iter().find(|v| v.id == current)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn node_kind_round_trips_names() {
        for name in ["Page", "Layout", "Button", "Chart"] {
            let kind = NodeKind::from_name(name).unwrap();
            assert_eq!(kind.name(), name);
        }
        assert!(NodeKind::from_name("Hero").is_none());
    }

    #[test]
    fn legacy_round_trip_is_identity_on_default_tree() {
        let legacy = registry::default_tree().to_legacy();
        let back = UiNode::from_legacy(&legacy, "root").unwrap();
        assert_eq!(back, registry::default_tree());
        assert_eq!(back.to_legacy(), legacy);
    }

    #[test]
    fn legacy_conversion_folds_class_name_into_props() {
        let legacy = serde_json::json!({
            "id": "layout_x",
            "type": "layout",
            "className": "generated-main",
            "children": []
        });
        let node = UiNode::from_legacy(&legacy, "root").unwrap();
        assert_eq!(node.component, NodeKind::Layout);
        assert_eq!(
            node.props.get("className").and_then(Value::as_str),
            Some("generated-main")
        );
    }

    #[test]
    fn legacy_conversion_derives_missing_ids_from_path() {
        let legacy = serde_json::json!({
            "type": "page",
            "children": [{ "type": "Button", "props": { "label": "Go" } }]
        });
        let node = UiNode::from_legacy(&legacy, "root").unwrap();
        assert_eq!(node.id, "root_page");
        assert_eq!(node.children[0].id, "root_0_button");
    }

    #[test]
    fn legacy_conversion_rejects_unknown_component() {
        let legacy = serde_json::json!({ "id": "x", "type": "Hero" });
        assert!(matches!(
            UiNode::from_legacy(&legacy, "root"),
            Err(TreeError::UnknownComponent(name)) if name == "Hero"
        ));
    }

    #[test]
    fn version_ids_match_the_classifier_token_pattern() {
        let id = new_prefixed_id("ver");
        assert!(id.starts_with("ver_"));
        assert!(id[4..].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn node_count_and_find() {
        let tree = registry::default_tree();
        assert_eq!(tree.count(), 6);
        assert!(tree.find("card_welcome").is_some());
        assert!(tree.find("missing").is_none());
    }
}
