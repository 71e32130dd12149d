//! Version intent classifier.
//!
//! Decides whether an instruction means "change the current UI", "roll back
//! to an earlier version", or "compare two versions", and resolves any
//! version id mentioned in the text against the known history. The
//! classifier is pure and deterministic; an oracle suggestion may be
//! reconciled on top of it, but never trusted past the version list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::types::PlannerSource;

static COMPARE_CUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(compare|diff|difference|versus|\bvs\b)").unwrap());
static ROLLBACK_CUES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(rollback|restore|revert|undo|go back|previous version|older version)")
        .unwrap()
});
static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ver_[a-z0-9_]+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionIntentKind {
    Modify,
    Rollback,
    Compare,
}

impl VersionIntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionIntentKind::Modify => "modify",
            VersionIntentKind::Rollback => "rollback",
            VersionIntentKind::Compare => "compare",
        }
    }

    fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "modify" => Some(VersionIntentKind::Modify),
            "rollback" => Some(VersionIntentKind::Rollback),
            "compare" => Some(VersionIntentKind::Compare),
            _ => None,
        }
    }
}

/// Classified version intent, ready for orchestration.
#[derive(Debug, Clone, Serialize)]
pub struct VersionIntent {
    pub intent_type: VersionIntentKind,
    /// Full id of the referenced version, or empty when unresolved.
    pub target_version: String,
    pub modification_plan: Map<String, Value>,
    pub source: PlannerSource,
}

/// Version ids mentioned in the text, deduplicated in order of appearance.
pub fn extract_version_tokens(intent: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for found in VERSION_TOKEN.find_iter(intent) {
        let token = found.as_str().to_string();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Exact id wins; otherwise the first prefix match in most-recent-first
/// order.
fn resolve_token(version_ids: &[String], token: &str) -> Option<String> {
    version_ids
        .iter()
        .find(|id| id.as_str() == token)
        .or_else(|| version_ids.iter().find(|id| id.starts_with(token)))
        .cloned()
}

/// Deterministic classification. `version_ids` must be most-recent-first and
/// `root_child_count` is the number of top-level sections in the current
/// tree.
pub fn classify_heuristic(
    intent: &str,
    version_ids: &[String],
    root_child_count: usize,
    current_version_id: &str,
) -> VersionIntent {
    let intent_type = if COMPARE_CUES.is_match(intent) {
        VersionIntentKind::Compare
    } else if ROLLBACK_CUES.is_match(intent) {
        VersionIntentKind::Rollback
    } else {
        VersionIntentKind::Modify
    };

    let mut target_version = extract_version_tokens(intent)
        .first()
        .and_then(|token| resolve_token(version_ids, token))
        .unwrap_or_default();

    if target_version.is_empty() && intent_type != VersionIntentKind::Modify {
        target_version = version_ids
            .iter()
            .find(|id| id.as_str() != current_version_id)
            .cloned()
            .unwrap_or_default();
    }

    let modification_plan = if intent_type == VersionIntentKind::Modify {
        let mut plan = Map::new();
        plan.insert("strategy".to_string(), json!("minimal-change"));
        plan.insert("preserve_layout".to_string(), json!(true));
        plan.insert("preserve_components".to_string(), json!(true));
        plan.insert("context_nodes".to_string(), json!(root_child_count));
        plan
    } else {
        Map::new()
    };

    VersionIntent {
        intent_type,
        target_version,
        modification_plan,
        source: PlannerSource::Heuristic,
    }
}

/// Merge an oracle suggestion over the heuristic result. The oracle is
/// advisory: unknown intent types and unresolvable targets fall back to the
/// heuristic values.
pub fn reconcile_oracle(
    raw: Option<&Value>,
    fallback: VersionIntent,
    version_ids: &[String],
) -> VersionIntent {
    let Some(obj) = raw.and_then(Value::as_object) else {
        return fallback;
    };

    let intent_type = obj
        .get("intent_type")
        .and_then(Value::as_str)
        .and_then(VersionIntentKind::from_raw)
        .unwrap_or(fallback.intent_type);

    let mut target_version = obj
        .get("target_version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.target_version.clone());
    if !target_version.is_empty() {
        target_version =
            resolve_token(version_ids, &target_version).unwrap_or_else(|| fallback.target_version.clone());
    }

    let modification_plan = match obj.get("modification_plan") {
        Some(Value::Object(plan)) => plan.clone(),
        _ => fallback.modification_plan,
    };

    VersionIntent {
        intent_type,
        target_version,
        modification_plan,
        source: PlannerSource::Llm,
    }
}
