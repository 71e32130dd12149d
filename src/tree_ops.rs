//! Tree mutation.
//!
//! Applies a canonical plan to a UI tree. Mutation is copy-on-write: the
//! previous tree is cloned and the clone edited, so stored versions stay
//! immutable. Operations run in canonical order; each one either lands on a
//! resolvable node or is skipped, never corrupting an unrelated sibling.
//!
//! Modify mode is strictly conservative. It honors update operations only,
//! and only against the singleton slots, typed content selectors, or
//! identity targets. Generate and regenerate modes apply the full operation
//! set.

use serde_json::Map;
use serde_json::Value;

use crate::registry::{default_ui_tree, infer_component, ComponentKind};
use crate::types::{Mode, NodeKind, OpType, Operation, Plan, Position, UiNode, UiTree};

/// Ordinal selector within same-typed content siblings. `Nth` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentSel {
    First,
    Last,
    Nth(usize),
}

/// Parsed operation target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Navbar,
    Sidebar,
    Content,
    ContentFirst,
    ContentLast,
    /// `content:<type>:<first|last|N>` among same-typed content children.
    Typed(ComponentKind, ContentSel),
    Id(String),
    /// Unrecognized target string; behaves like `content:last`.
    Loose,
}

/// Parse a raw target. `None` means a typed selector with an invalid
/// ordinal; the operation must be skipped.
fn parse_target(raw: &str) -> Option<Target> {
    if let Some(id) = raw.strip_prefix("id:") {
        return Some(Target::Id(id.to_string()));
    }
    match raw {
        "navbar" => Some(Target::Navbar),
        "sidebar" => Some(Target::Sidebar),
        "content" => Some(Target::Content),
        "content:first" => Some(Target::ContentFirst),
        "content:last" => Some(Target::ContentLast),
        other => {
            if let Some(rest) = other.strip_prefix("content:") {
                let mut parts = rest.splitn(2, ':');
                let type_part = parts.next().unwrap_or("");
                if let Some(kind) = ComponentKind::from_name_ci(type_part) {
                    let sel = match parts.next() {
                        None | Some("last") => ContentSel::Last,
                        Some("first") => ContentSel::First,
                        Some(ordinal) => match ordinal.parse::<usize>() {
                            Ok(n) if n >= 1 => ContentSel::Nth(n),
                            _ => return None,
                        },
                    };
                    return Some(Target::Typed(kind, sel));
                }
            }
            Some(Target::Loose)
        }
    }
}

fn navbar_slot(root: &mut UiNode) -> Option<&mut UiNode> {
    root.children.get_mut(0)
}

fn sidebar_slot(root: &mut UiNode) -> Option<&mut UiNode> {
    root.children.get_mut(1)?.children.get_mut(0)
}

fn content_slot(root: &mut UiNode) -> Option<&mut UiNode> {
    root.children.get_mut(1)?.children.get_mut(1)
}

fn has_content_slot(root: &UiNode) -> bool {
    root.children.get(1).map_or(false, |layout| layout.children.len() > 1)
}

/// Smallest `{prefix}_{n}` (n from 1) not already used as an id.
fn next_node_id(root: &UiNode, prefix: &str) -> String {
    let ids = root.ids();
    let mut n = 1usize;
    loop {
        let candidate = format!("{prefix}_{n}");
        if !ids.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn remove_node_by_id(node: &mut UiNode, id: &str) -> bool {
    if let Some(pos) = node.children.iter().position(|child| child.id == id) {
        node.children.remove(pos);
        return true;
    }
    node.children
        .iter_mut()
        .any(|child| remove_node_by_id(child, id))
}

/// Index into content children for a typed selector, matching by component
/// type first, then by ordinal among same-typed siblings.
fn resolve_content_index(content: &UiNode, kind: ComponentKind, sel: ContentSel) -> Option<usize> {
    let matches: Vec<usize> = content
        .children
        .iter()
        .enumerate()
        .filter(|(_, child)| child.component == NodeKind::Widget(kind))
        .map(|(idx, _)| idx)
        .collect();
    match sel {
        ContentSel::First => matches.first().copied(),
        ContentSel::Last => matches.last().copied(),
        ContentSel::Nth(n) => matches.get(n - 1).copied(),
    }
}

/// Update merge policy: a type-preserving update shallow-merges sanitized
/// props (incoming wins); a type change replaces props wholesale.
/// `preserve_title` shields an existing `title` from being overwritten.
fn merge_into(node: &mut UiNode, kind: ComponentKind, props: &Map<String, Value>, preserve_title: bool) {
    let mut sanitized = kind.sanitize_props(props);
    if preserve_title && node.props.contains_key("title") {
        sanitized.remove("title");
    }
    if node.component == NodeKind::Widget(kind) {
        for (key, value) in sanitized {
            node.props.insert(key, value);
        }
    } else {
        node.component = NodeKind::Widget(kind);
        node.props = sanitized;
    }
}

fn insert_child(parent: &mut UiNode, node: UiNode, position: Position) {
    match position {
        Position::Prepend => parent.children.insert(0, node),
        _ => parent.children.push(node),
    }
}

fn allowed_in_modify(target: &Target) -> bool {
    matches!(
        target,
        Target::Navbar | Target::Sidebar | Target::Typed(_, _) | Target::Id(_)
    )
}

/// Apply a canonical plan. Generate mode (or a missing previous tree)
/// starts from the fixed default layout; modify and regenerate start from a
/// clone of the previous tree. The returned tree's version is the
/// previous version plus one.
pub fn apply_plan(previous: Option<&UiTree>, plan: &Plan, mode: Mode, intent: &str) -> UiTree {
    let mut tree = match previous {
        Some(prev) if mode != Mode::Generate => prev.clone(),
        _ => default_ui_tree(),
    };
    tree.version = previous.map(|prev| prev.version).unwrap_or(0) + 1;

    if !has_content_slot(&tree.root) {
        return tree;
    }

    let intent_lower = intent.to_lowercase();
    for op in &plan.operations {
        apply_operation(&mut tree, op, mode, intent, &intent_lower);
    }
    tree
}

fn apply_operation(tree: &mut UiTree, op: &Operation, mode: Mode, intent: &str, intent_lower: &str) {
    if mode == Mode::Modify && op.op_type != OpType::Update {
        return;
    }

    let Some(mut target) = parse_target(&op.target) else {
        return;
    };

    if op.op_type == OpType::Remove {
        if let Target::Id(id) = &target {
            if remove_node_by_id(&mut tree.root, id) {
                return;
            }
        }
        if let Some(content) = content_slot(&mut tree.root) {
            content.children.pop();
        }
        return;
    }

    // An operation naming a component outside the registry never lands.
    let stated = match &op.component {
        Some(name) => match ComponentKind::from_name(name) {
            Some(kind) => Some(kind),
            None => return,
        },
        None => None,
    };

    // Navbar and Sidebar are exactly-one-instance slots; a component of
    // either kind retargets there no matter what the operation said.
    match stated {
        Some(ComponentKind::Navbar) => target = Target::Navbar,
        Some(ComponentKind::Sidebar) => target = Target::Sidebar,
        _ => {}
    }

    if mode == Mode::Modify {
        if let Some(kind) = stated {
            let generic = matches!(
                target,
                Target::Content | Target::ContentFirst | Target::ContentLast
            );
            let retargetable = matches!(
                kind,
                ComponentKind::Card | ComponentKind::Button | ComponentKind::Table | ComponentKind::Chart
            );
            if generic && retargetable {
                target = Target::Typed(kind, ContentSel::Last);
            }
        }
        if !allowed_in_modify(&target) {
            return;
        }
    }

    match op.op_type {
        OpType::Add => apply_add(tree, op, &target, stated, intent),
        OpType::Update => apply_update(tree, op, &target, stated, mode, intent, intent_lower),
        OpType::Remove => unreachable!("handled above"),
    }
}

fn apply_add(tree: &mut UiTree, op: &Operation, target: &Target, stated: Option<ComponentKind>, intent: &str) {
    // Adding to a singleton slot merges rather than duplicating the slot.
    match target {
        Target::Navbar => {
            if let Some(slot) = navbar_slot(&mut tree.root) {
                merge_into(slot, ComponentKind::Navbar, &op.props, false);
            }
            return;
        }
        Target::Sidebar => {
            if let Some(slot) = sidebar_slot(&mut tree.root) {
                merge_into(slot, ComponentKind::Sidebar, &op.props, false);
            }
            return;
        }
        _ => {}
    }

    let kind = stated.unwrap_or_else(|| infer_component(intent));
    let node_id = match &op.id {
        Some(id) => id.clone(),
        None => next_node_id(&tree.root, &kind.name().to_lowercase()),
    };
    let node = UiNode::new(node_id, NodeKind::Widget(kind)).with_props(kind.sanitize_props(&op.props));

    if let Target::Id(parent_id) = target {
        if let Some(parent) = tree.root.find_mut(parent_id) {
            insert_child(parent, node, op.position);
            return;
        }
    }
    if let Some(content) = content_slot(&mut tree.root) {
        insert_child(content, node, op.position);
    }
}

fn apply_update(
    tree: &mut UiTree,
    op: &Operation,
    target: &Target,
    stated: Option<ComponentKind>,
    mode: Mode,
    intent: &str,
    intent_lower: &str,
) {
    match target {
        Target::Navbar => {
            if let Some(slot) = navbar_slot(&mut tree.root) {
                merge_into(slot, ComponentKind::Navbar, &op.props, false);
            }
        }
        Target::Sidebar => {
            let preserve_title = mode == Mode::Modify && !intent_lower.contains("sidebar title");
            if let Some(slot) = sidebar_slot(&mut tree.root) {
                merge_into(slot, ComponentKind::Sidebar, &op.props, preserve_title);
            }
        }
        Target::Id(id) => {
            if let Some(node) = tree.root.find_mut(id) {
                // Layout containers are never directly editable.
                let Some(existing) = node.component.widget() else {
                    return;
                };
                merge_into(node, stated.unwrap_or(existing), &op.props, false);
                return;
            }
            if mode != Mode::Modify {
                update_positional(tree, op, Target::ContentLast, stated, intent);
            }
        }
        Target::Typed(kind, sel) => {
            let tkind = *kind;
            let tsel = *sel;
            if let Some(content) = content_slot(&mut tree.root) {
                if let Some(idx) = resolve_content_index(content, tkind, tsel) {
                    merge_into(&mut content.children[idx], stated.unwrap_or(tkind), &op.props, false);
                }
            }
        }
        Target::Content | Target::ContentFirst | Target::ContentLast | Target::Loose => {
            update_positional(tree, op, target.clone(), stated, intent);
        }
    }
}

/// Generic positional update against the content node: first child for
/// `content:first`, otherwise the last child. Updating empty content
/// appends a fresh node instead.
fn update_positional(tree: &mut UiTree, op: &Operation, target: Target, stated: Option<ComponentKind>, intent: &str) {
    let kind = stated.unwrap_or_else(|| infer_component(intent));
    let node_id = match &op.id {
        Some(id) => id.clone(),
        None => next_node_id(&tree.root, &kind.name().to_lowercase()),
    };
    let Some(content) = content_slot(&mut tree.root) else {
        return;
    };
    if content.children.is_empty() {
        let node = UiNode::new(node_id, NodeKind::Widget(kind)).with_props(kind.sanitize_props(&op.props));
        content.children.push(node);
        return;
    }
    let idx = if target == Target::ContentFirst {
        0
    } else {
        content.children.len() - 1
    };
    merge_into(&mut content.children[idx], kind, &op.props, false);
}
