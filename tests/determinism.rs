//! Determinism and invariant tests: identical inputs yield identical
//! trees and code, canonicalization is order-insensitive, the legacy tree
//! shape round-trips, and mutations stay inside the whitelisted registry.

use pretty_assertions::assert_eq;
use serde_json::json;
use uiforge::canonical::canonicalize;
use uiforge::orchestrator::{GenerateRequest, RunOutcome};
use uiforge::{
    ComponentKind, Engine, EngineConfig, PlannerSource, StubLlmProvider, UiTree,
};

fn request(intent: &str, mode: Option<&str>, session_id: Option<&str>) -> GenerateRequest {
    GenerateRequest {
        intent: intent.to_string(),
        mode: mode.map(str::to_string),
        session_id: session_id.map(str::to_string),
    }
}

async fn run_generated(
    engine: &Engine,
    intent: &str,
    mode: Option<&str>,
    session_id: Option<&str>,
) -> uiforge::orchestrator::GeneratedResponse {
    match engine.run(&request(intent, mode, session_id)).await.unwrap() {
        RunOutcome::Generated(payload) => payload,
        other => panic!("expected a generated outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn identical_request_sequences_produce_identical_trees_and_code() {
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let engine = Engine::new(EngineConfig::offline());
        let first = run_generated(
            &engine,
            "Create a sales dashboard with KPI cards (Revenue, Leads, Win Rate)",
            None,
            None,
        )
        .await;
        let second = run_generated(
            &engine,
            "rename the navbar to Quarterly Review",
            Some("modify"),
            Some(&first.session_id),
        )
        .await;
        outputs.push((second.version.ui_ast.clone(), second.version.code.clone()));
    }

    assert_eq!(outputs[0].0, outputs[1].0);
    assert_eq!(outputs[0].1, outputs[1].1);
}

#[test]
fn canonicalization_is_order_insensitive_and_strips_noise() {
    let add = json!({
        "type": "add",
        "target": "content",
        "component": "Chart",
        "props": { "title": "Usage", "points": [1, 2], "labels": ["a", "b"] }
    });
    let update = json!({
        "type": "update",
        "target": "navbar",
        "component": "Navbar",
        "props": { "title": "Ops" }
    });
    let remove = json!({ "type": "remove", "target": "content:last" });

    let forward = json!({
        "title": "Same plan",
        "notes": ["one note"],
        "seed": 42,
        "timestamp": "2026-01-01T00:00:00Z",
        "operations": [add, update, remove]
    });
    let shuffled = json!({
        "title": "Same plan",
        "notes": ["one note"],
        "operations": [remove, add, update]
    });

    let canonical_forward = canonicalize(&forward);
    let canonical_shuffled = canonicalize(&shuffled);

    assert_eq!(canonical_forward, canonical_shuffled);
    assert!(!canonical_forward.metadata.contains_key("seed"));
    assert!(!canonical_forward.metadata.contains_key("timestamp"));
    // Removals sort ahead of updates, additions last.
    let kinds: Vec<&str> = canonical_forward
        .operations
        .iter()
        .map(|op| op.op_type.as_str())
        .collect();
    assert_eq!(kinds, vec!["remove", "update", "add"]);
}

#[tokio::test]
async fn legacy_tree_shape_round_trips() {
    let engine = Engine::new(EngineConfig::offline());
    let payload = run_generated(&engine, "create a project dashboard", None, None).await;

    let tree = &payload.version.ui_ast;
    let legacy = tree.to_legacy_value();
    let decoded = UiTree::from_legacy_value(&legacy).unwrap();
    assert_eq!(decoded.root, tree.root);

    // The stored legacy snapshot is the same projection.
    assert_eq!(payload.version.ui_tree, legacy);
}

#[tokio::test]
async fn off_registry_llm_plans_fall_back_and_never_reach_the_tree() {
    let plan = json!({
        "title": "Add a hero",
        "operations": [
            { "type": "add", "target": "content", "component": "Hero", "props": {} }
        ]
    });
    let engine = Engine::with_oracle(
        EngineConfig::offline(),
        Box::new(StubLlmProvider::with_json(plan)),
    );

    let payload = run_generated(&engine, "add a hero banner", None, None).await;
    assert_eq!(payload.version.planner_source, PlannerSource::Heuristic);
    assert!(!payload.version.code.contains("Hero"));
}

#[tokio::test]
async fn modify_touches_only_the_named_slot() {
    let engine = Engine::new(EngineConfig::offline());
    let first = run_generated(&engine, "create a sales dashboard", None, None).await;

    let before = first.version.ui_ast.clone();
    let second = run_generated(
        &engine,
        "change the button to Export Report",
        Some("modify"),
        Some(&first.session_id),
    )
    .await;
    let after = &second.version.ui_ast;

    // Navbar and sidebar are untouched.
    assert_eq!(after.root.children[0], before.root.children[0]);
    assert_eq!(
        after.root.children[1].children[0],
        before.root.children[1].children[0]
    );

    let content_before = &before.root.children[1].children[1];
    let content_after = &after.root.children[1].children[1];
    assert_eq!(content_after.children.len(), content_before.children.len());

    let button = content_after
        .children
        .iter()
        .find(|child| child.component.widget() == Some(ComponentKind::Button))
        .unwrap();
    assert_eq!(button.props.get("label"), Some(&json!("Export Report")));
    assert_eq!(button.props.get("variant"), Some(&json!("primary")));
}

#[tokio::test]
async fn remove_pops_the_last_content_child() {
    let engine = Engine::new(EngineConfig::offline());
    let first = run_generated(&engine, "create a sales dashboard", None, None).await;
    let content_before = first.version.ui_ast.root.children[1].children[1]
        .children
        .len();

    // Removes only apply in regenerate mode; modify is update-only.
    let second = run_generated(
        &engine,
        "remove the last section",
        Some("regenerate"),
        Some(&first.session_id),
    )
    .await;
    let content = &second.version.ui_ast.root.children[1].children[1];
    assert_eq!(content.children.len(), content_before - 1);
    // The dashboard's trailing button went away.
    assert!(content
        .children
        .iter()
        .all(|child| child.component.widget() != Some(ComponentKind::Button)));
}

#[tokio::test]
async fn sidebar_item_rewrite_preserves_its_title() {
    let engine = Engine::new(EngineConfig::offline());
    let first = run_generated(&engine, "create a sales dashboard", None, None).await;
    let sidebar = &first.version.ui_ast.root.children[1].children[0];
    assert_eq!(sidebar.props.get("title"), Some(&json!("Menu")));

    let second = run_generated(
        &engine,
        "set the sidebar items to Alpha, Beta",
        Some("modify"),
        Some(&first.session_id),
    )
    .await;
    let sidebar = &second.version.ui_ast.root.children[1].children[0];
    assert_eq!(sidebar.props.get("items"), Some(&json!(["Alpha", "Beta"])));
    assert_eq!(sidebar.props.get("title"), Some(&json!("Menu")));
}
