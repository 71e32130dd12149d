//! Explanation synthesis.
//!
//! The oracle gets first shot at prose; any unusable answer (absent, empty,
//! transport failure) drops to a deterministic fallback. Edits are explained
//! by diffing node-id sets between the previous and next trees; initial
//! generations by enumerating the plan.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::oracle::LlmProvider;
use crate::planner::{edit_explainer_prompt, explainer_prompt};
use crate::types::{Mode, OpType, Plan, PlannerSource, UiNode};

/// Everything the explainer reads from the finished pipeline state.
pub struct ExplainRequest<'a> {
    pub intent: &'a str,
    pub mode: Mode,
    pub plan: &'a Plan,
    pub planner_source: PlannerSource,
    pub previous_root: Option<&'a UiNode>,
    pub generated_root: &'a UiNode,
}

fn intent_excerpt(intent: &str) -> String {
    intent.chars().take(180).collect()
}

fn node_value(node: &UiNode) -> Value {
    serde_json::to_value(node).unwrap_or(Value::Null)
}

fn edit_aware_heuristic(
    intent: &str,
    previous_root: &UiNode,
    updated_root: &UiNode,
    plan: &Plan,
) -> String {
    let prev_ids: HashSet<String> = previous_root.ids().into_iter().collect();
    let next_ids: HashSet<String> = updated_root.ids().into_iter().collect();

    let preserved = prev_ids.intersection(&next_ids).count();
    let added = next_ids.len().saturating_sub(preserved);
    let modified = plan
        .operations
        .iter()
        .filter(|op| op.op_type == OpType::Update)
        .count();

    let prev_count = previous_root.count();
    let next_count = updated_root.count();

    [
        format!("Preserved: {preserved} existing UI nodes remained in place."),
        format!("Modified: {modified} targeted updates were applied based on your request."),
        format!("Added: {added} new nodes were introduced where needed."),
        format!(
            "Minimal change rationale: The structure moved from {prev_count} to {next_count} nodes and avoided full rewrite."
        ),
        format!("Intent focus: {}", intent_excerpt(intent)),
    ]
    .join("\n")
}

fn initial_heuristic(
    intent: &str,
    plan: &Plan,
    planner_source: PlannerSource,
    generated_root: &UiNode,
) -> String {
    let mut lines = Vec::new();
    lines.push("1. Intent interpretation:".to_string());
    lines.push(format!(
        "I interpreted your request as: \"{}\".",
        intent_excerpt(intent)
    ));

    lines.push("2. Component choices:".to_string());
    if plan.operations.is_empty() {
        lines.push("No component changes were required for this update.".to_string());
    } else {
        for op in &plan.operations {
            lines.push(format!(
                "- {} {} at {}.",
                op.op_type.as_str(),
                op.component.as_deref().unwrap_or("component"),
                op.target
            ));
        }
    }

    lines.push("3. Layout structure:".to_string());
    lines.push(format!(
        "The layout keeps a stable hierarchy with {} top-level sections.",
        generated_root.children.len()
    ));

    lines.push("4. Deterministic constraints:".to_string());
    lines.push(format!("Planner source was {}.", planner_source.as_str()));
    lines.push("Only approved components were used, with fixed schemas and validation checks.".to_string());

    lines.join("\n")
}

/// Produce an explanation for the finished change. Never fails; the oracle
/// is strictly optional here.
pub async fn run_explainer(
    oracle: Option<&dyn LlmProvider>,
    request: &ExplainRequest<'_>,
) -> String {
    let edit_aware = request.previous_root.is_some() && request.mode.is_edit();

    if let Some(oracle) = oracle {
        let prompt = match (edit_aware, request.previous_root) {
            (true, Some(previous)) => edit_explainer_prompt(
                &node_value(previous),
                &node_value(request.generated_root),
                request.intent,
            ),
            _ => explainer_prompt(
                request.intent,
                request.plan,
                &node_value(request.generated_root),
            ),
        };
        match oracle.generate_text(&prompt).await {
            Ok(Some(text)) if !text.trim().is_empty() => return text,
            Ok(_) => {}
            Err(err) => debug!(error = %err, "explainer oracle unavailable, using fallback"),
        }
    }

    match (edit_aware, request.previous_root) {
        (true, Some(previous)) => {
            edit_aware_heuristic(request.intent, previous, request.generated_root, request.plan)
        }
        _ => initial_heuristic(
            request.intent,
            request.plan,
            request.planner_source,
            request.generated_root,
        ),
    }
}
