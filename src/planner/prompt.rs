//! Deterministic prompt assembly for every oracle call.
//!
//! Prompts are plain string templates over request state; nothing here is
//! random or time-dependent, so a given pipeline state always produces the
//! same prompt (and the same request hash in the logs).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::registry::ComponentKind;
use crate::types::{Mode, Plan, VersionRecord};

/// Compact slice of a version record, all an oracle needs to reason about
/// history.
#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<&VersionRecord> for VersionSummary {
    fn from(record: &VersionRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.plan.title.clone(),
            created_at: record.created_at,
        }
    }
}

fn registry_json() -> String {
    let names: Vec<&str> = ComponentKind::ALL.iter().map(|kind| kind.name()).collect();
    serde_json::to_string(&names).unwrap_or_default()
}

fn registry_list() -> String {
    ComponentKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn json_compact<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn json_pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn opt_json_compact<T: Serialize>(value: Option<&T>) -> String {
    value.map_or_else(|| "null".to_string(), json_compact)
}

fn truncated(text: Option<&str>, limit: usize) -> String {
    text.unwrap_or("none").chars().take(limit).collect()
}

/// Classifier prompt: decide modify vs rollback vs compare.
pub fn version_intent_prompt(
    versions: &[VersionSummary],
    current_version_id: &str,
    intent: &str,
) -> String {
    format!(
        r#"SYSTEM ROLE:
You are a UI version control planner.

VERSION HISTORY (most recent first):
{history}

CURRENT VERSION ID:
{current}

USER REQUEST:
{intent}

TASK:
Determine whether the user intends to:
- Modify the current UI
- Restore a previous version
- Compare versions

OUTPUT:
{{
  "intent_type": "modify | rollback | compare",
  "target_version": "optional version id",
  "reason": "short explanation"
}}
Return strict JSON only."#,
        history = json_compact(&versions),
        current = if current_version_id.is_empty() { "none" } else { current_version_id },
    )
}

/// State fed into the planner prompt.
pub struct PlannerPromptInput<'a> {
    pub intent: &'a str,
    pub mode: Mode,
    pub previous_plan: Option<&'a Plan>,
    pub previous_code: Option<&'a str>,
    /// Legacy-shape tree, `None` when planning from scratch.
    pub previous_tree: Option<&'a Value>,
}

/// Planner prompt. Edit modes get the bucketed modify dialect; generate mode
/// asks for the flat operation list.
pub fn planner_prompt(input: &PlannerPromptInput) -> String {
    if input.mode.is_edit() {
        return format!(
            r#"SYSTEM ROLE:
You are a UI Planning Agent responsible for modifying an existing UI tree using deterministic rules.

CRITICAL RULES:
- NEVER regenerate the entire UI unless the user explicitly requests a full rewrite.
- You MUST preserve existing components whenever possible.
- You MUST modify only nodes required by the user request.
- You MUST maintain layout hierarchy.
- You MUST use only components from the allowed component registry.
- You MUST output a structured JSON plan only.
- Do NOT output React code.

AVAILABLE COMPONENTS:
{registry}

CURRENT UI TREE:
{tree}

CURRENT PLAN CONTEXT:
{plan}

CURRENT CODE SNAPSHOT (truncated):
{code}

USER REQUEST:
{intent}

PLANNING OBJECTIVE:
Return a modification plan describing:
1. Components to update
2. Components to add
3. Components to remove
4. Layout restructuring if necessary

OUTPUT FORMAT:
{{
  "action": "modify",
  "updates": [],
  "additions": [],
  "removals": [],
  "layout_changes": [],
  "reasoning": "short explanation"
}}

IMPORTANT:
- Preserve component IDs when they exist.
- Maintain parent-child relationships.
- Prefer a minimal change strategy."#,
            registry = registry_json(),
            tree = opt_json_compact(input.previous_tree),
            plan = opt_json_compact(input.previous_plan),
            code = truncated(input.previous_code, 1200),
            intent = input.intent,
        );
    }

    format!(
        r#"You are the PLANNER agent in a deterministic UI pipeline.
Mode: {mode}
Allowed Components: {registry}
User Intent: {intent}
Current UI Tree (JSON): {tree}
Previous Plan (JSON): {plan}
Previous Code (truncated): {code}

Return ONLY strict JSON with this shape:
{{
  "title": "string",
  "operations": [
    {{
      "type": "add|update|remove",
      "target": "string",
      "component": "Button|Card|Input|Table|Modal|Sidebar|Navbar|Chart|null",
      "props": {{"any": "value"}},
      "position": "append|prepend|replace"
    }}
  ],
  "notes": ["string"]
}}
Rules:
- Never use components outside the whitelist.
- Keep operations minimal and deterministic."#,
        mode = input.mode.as_str(),
        registry = registry_list(),
        intent = input.intent,
        tree = opt_json_compact(input.previous_tree),
        plan = opt_json_compact(input.previous_plan),
        code = truncated(input.previous_code, 1200),
    )
}

/// Initial-generation explainer prompt.
pub fn explainer_prompt(intent: &str, plan: &Plan, generated_root: &Value) -> String {
    format!(
        r#"SYSTEM ROLE:
You are a UI reasoning explainer.

USER INTENT:
{intent}

PLANNER OUTPUT:
{plan}

GENERATED UI STRUCTURE:
{tree}

TASK:
Explain:
1. How the user intent was interpreted
2. Why specific components were chosen
3. How the layout was structured
4. How deterministic constraints were followed

STYLE:
Plain English
Clear and concise
No technical jargon"#,
        plan = json_pretty(plan),
        tree = json_pretty(generated_root),
    )
}

/// Edit-aware explainer prompt, fed the before and after trees.
pub fn edit_explainer_prompt(previous_root: &Value, updated_root: &Value, intent: &str) -> String {
    format!(
        r#"SYSTEM ROLE:
You explain incremental UI changes.

PREVIOUS UI:
{previous}

UPDATED UI:
{updated}

USER REQUEST:
{intent}

TASK:
Explain:
- What was preserved
- What was modified
- What was added
- Why these changes were minimal

IMPORTANT:
Highlight preservation of the existing UI."#,
        previous = json_pretty(previous_root),
        updated = json_pretty(updated_root),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_input<'a>(mode: Mode, tree: Option<&'a Value>) -> PlannerPromptInput<'a> {
        PlannerPromptInput {
            intent: "add a chart",
            mode,
            previous_plan: None,
            previous_code: None,
            previous_tree: tree,
        }
    }

    #[test]
    fn generate_prompt_carries_registry_and_intent() {
        let prompt = planner_prompt(&sample_input(Mode::Generate, None));
        assert!(prompt.contains("Mode: generate"));
        assert!(prompt.contains("add a chart"));
        assert!(prompt.contains("Button, Card, Input, Table, Modal, Sidebar, Navbar, Chart"));
        assert!(prompt.contains("Current UI Tree (JSON): null"));
        assert!(prompt.contains("Previous Code (truncated): none"));
    }

    #[test]
    fn modify_prompt_requests_bucketed_output() {
        let tree = json!({"id": "page_root", "type": "page", "children": []});
        let prompt = planner_prompt(&sample_input(Mode::Modify, Some(&tree)));
        assert!(prompt.contains("\"updates\": []"));
        assert!(prompt.contains("\"layout_changes\": []"));
        assert!(prompt.contains("page_root"));
        assert!(prompt.contains("Do NOT output React code."));
    }

    #[test]
    fn version_intent_prompt_lists_history_and_current() {
        let versions = vec![VersionSummary {
            id: "ver_abc".to_string(),
            title: "Initial UI generation".to_string(),
            created_at: Utc::now(),
        }];
        let prompt = version_intent_prompt(&versions, "ver_abc", "roll back please");
        assert!(prompt.contains("ver_abc"));
        assert!(prompt.contains("roll back please"));
        assert!(prompt.contains("Return strict JSON only."));
    }

    #[test]
    fn prompts_are_deterministic() {
        let tree = json!({"id": "x"});
        let a = planner_prompt(&sample_input(Mode::Modify, Some(&tree)));
        let b = planner_prompt(&sample_input(Mode::Modify, Some(&tree)));
        assert_eq!(a, b);
    }

    #[test]
    fn code_snapshot_is_truncated() {
        let long_code = "x".repeat(5000);
        let input = PlannerPromptInput {
            intent: "tweak",
            mode: Mode::Modify,
            previous_plan: None,
            previous_code: Some(&long_code),
            previous_tree: None,
        };
        let prompt = planner_prompt(&input);
        assert!(!prompt.contains(&long_code));
        assert!(prompt.contains(&"x".repeat(1200)));
    }
}
