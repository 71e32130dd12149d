//! Pipeline orchestration.
//!
//! One request in, one outcome out: guard the intent, classify it against
//! the session history, branch into rollback/compare when that is what the
//! user asked for, otherwise plan, canonicalize, mutate, validate,
//! generate, explain, and persist. Every accepted change lands as an
//! immutable version record; rollback and compare never create one.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::canonical::canonicalize;
use crate::classifier::{classify_heuristic, reconcile_oracle, VersionIntent, VersionIntentKind};
use crate::codegen::render_generated_ui;
use crate::config::EngineConfig;
use crate::errors::PipelineError;
use crate::explainer::{run_explainer, ExplainRequest};
use crate::oracle::{LlmProvider, OracleFactory};
use crate::planner::{run_planner, version_intent_prompt, PlanRequest, VersionSummary};
use crate::registry::default_ui_tree;
use crate::security::{analyze_intent_security, SecurityCheck};
use crate::store::{NewVersion, SessionStore};
use crate::tree_ops::apply_plan;
use crate::types::{Mode, SessionId, UiTree, VersionId, VersionRecord};
use crate::validation::{validate_code, validate_tree, CodeValidation, PropValidation};

/// One generation request, as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub intent: String,
    /// `generate` (default), `modify`, or `regenerate`.
    pub mode: Option<String>,
    /// Absent or unknown ids start a fresh session.
    pub session_id: Option<String>,
}

/// The classified version intent as reported to the caller, with any mode
/// override or degrade note attached.
#[derive(Debug, Clone, Serialize)]
pub struct VersionIntentReport {
    #[serde(flatten)]
    pub intent: VersionIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_by_mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_fallback_reason: Option<String>,
}

impl VersionIntentReport {
    /// An explicit edit mode comes from a UI action button and is
    /// authoritative over the classifier.
    fn new(intent: VersionIntent, mode: Mode) -> Self {
        let mut report = VersionIntentReport {
            intent,
            forced_by_mode: None,
            rollback_fallback_reason: None,
            compare_fallback_reason: None,
        };
        if mode.is_edit() {
            report.intent.intent_type = VersionIntentKind::Modify;
            report.forced_by_mode = Some(mode);
        }
        report
    }

    fn degrade_rollback(&mut self, reason: impl Into<String>) {
        self.intent.intent_type = VersionIntentKind::Modify;
        self.rollback_fallback_reason = Some(reason.into());
    }

    fn degrade_compare(&mut self, reason: impl Into<String>) {
        self.intent.intent_type = VersionIntentKind::Modify;
        self.compare_fallback_reason = Some(reason.into());
    }
}

/// Version-over-version size and title comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub current_version: VersionId,
    pub target_version: VersionId,
    pub current_code_size: usize,
    pub target_code_size: usize,
    pub current_plan_title: String,
    pub target_plan_title: String,
}

/// Payload for an accepted generation.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedResponse {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    #[serde(rename = "currentVersionId")]
    pub current_version_id: VersionId,
    pub version: VersionRecord,
    pub security_check: SecurityCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_warning: Option<String>,
    pub version_intent: VersionIntentReport,
    pub prop_validation: PropValidation,
    pub code_validation: CodeValidation,
    pub history: Vec<VersionRecord>,
}

/// Payload for a rollback resolved from the intent. No new record.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackResponse {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    #[serde(rename = "currentVersionId")]
    pub current_version_id: VersionId,
    pub version: VersionRecord,
    pub version_intent: VersionIntentReport,
    pub history: Vec<VersionRecord>,
}

/// Payload for a version comparison. No new record.
#[derive(Debug, Clone, Serialize)]
pub struct CompareResponse {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    #[serde(rename = "currentVersionId")]
    pub current_version_id: VersionId,
    pub version: VersionRecord,
    pub version_intent: VersionIntentReport,
    pub comparison: Comparison,
    pub explanation: String,
    pub history: Vec<VersionRecord>,
}

/// Successful pipeline outcomes.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Generated(GeneratedResponse),
    RolledBack(RollbackResponse),
    Compared(CompareResponse),
}

fn compare_explanation(comparison: &Comparison) -> String {
    format!(
        "Compared \"{}\" ({}) against \"{}\" ({}). Generated code sizes are {} and {} characters.",
        comparison.current_plan_title,
        comparison.current_version,
        comparison.target_plan_title,
        comparison.target_version,
        comparison.current_code_size,
        comparison.target_code_size,
    )
}

/// The generation engine: session store, optional oracle, configuration.
/// All methods take `&self`; the store synchronizes internally.
pub struct Engine {
    store: SessionStore,
    oracle: Option<Box<dyn LlmProvider>>,
    config: EngineConfig,
}

impl Engine {
    /// Build from configuration. A configured key constructs the provider;
    /// without one the engine runs heuristics-only.
    pub fn new(config: EngineConfig) -> Self {
        let oracle = if config.has_credentials() {
            match OracleFactory::create(config.oracle_config()) {
                Ok(provider) => Some(provider),
                Err(err) => {
                    warn!(error = %err, "oracle construction failed, continuing without one");
                    None
                }
            }
        } else {
            None
        };
        Engine {
            store: SessionStore::new(),
            oracle,
            config,
        }
    }

    /// Build with an explicit provider, bypassing the factory.
    pub fn with_oracle(config: EngineConfig, oracle: Box<dyn LlmProvider>) -> Self {
        Engine {
            store: SessionStore::new(),
            oracle: Some(oracle),
            config,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Heuristic classification, reconciled with an advisory oracle pass
    /// when a provider is wired. Oracle failures here never fail the run.
    async fn classify_version_intent(
        &self,
        intent: &str,
        versions: &[VersionRecord],
        previous_tree: Option<&UiTree>,
        current_version_id: &str,
    ) -> VersionIntent {
        let version_ids: Vec<String> = versions.iter().map(|record| record.id.clone()).collect();
        let root_child_count = previous_tree
            .map(|tree| tree.root.children.len())
            .unwrap_or_else(|| default_ui_tree().root.children.len());
        let heuristic =
            classify_heuristic(intent, &version_ids, root_child_count, current_version_id);

        let Some(oracle) = self.oracle.as_deref() else {
            return heuristic;
        };
        let summaries: Vec<VersionSummary> = versions.iter().map(VersionSummary::from).collect();
        let prompt = version_intent_prompt(&summaries, current_version_id, intent);
        match oracle.generate_json(&prompt).await {
            Ok(raw) => reconcile_oracle(raw.as_ref(), heuristic, &version_ids),
            Err(err) => {
                debug!(error = %err, "version intent oracle unavailable, keeping heuristic");
                heuristic
            }
        }
    }

    fn resolve_compare_target(
        &self,
        session_id: &str,
        target_version: &str,
        versions: &[VersionRecord],
        current_id: &str,
    ) -> Option<VersionRecord> {
        if !target_version.is_empty() {
            if let Some(record) = self.store.version_by_id(session_id, target_version) {
                return Some(record);
            }
        }
        versions.iter().find(|record| record.id != current_id).cloned()
    }

    /// Run the full pipeline for one request.
    pub async fn run(&self, request: &GenerateRequest) -> Result<RunOutcome, PipelineError> {
        let guard = analyze_intent_security(&request.intent);
        let effective_intent = guard.safe_intent_summary.trim().to_string();
        if !guard.is_safe && effective_intent.is_empty() {
            return Err(PipelineError::UnsafeIntent(guard));
        }
        let mode = Mode::parse_or_generate(request.mode.as_deref());

        let session = self.store.ensure_session(request.session_id.as_deref());
        let versions = self.store.list_versions(&session.id);
        let current_version = self.store.current_version(&session.id);
        let previous_tree = self.store.latest_tree(&session.id);
        let current_version_id = current_version
            .as_ref()
            .map(|record| record.id.clone())
            .unwrap_or_default();

        let classified = self
            .classify_version_intent(
                &effective_intent,
                &versions,
                previous_tree.as_ref(),
                &current_version_id,
            )
            .await;
        let mut report = VersionIntentReport::new(classified, mode);

        if report.intent.intent_type == VersionIntentKind::Rollback {
            if report.intent.target_version.is_empty() {
                report.degrade_rollback("No rollback target version found, fallback to modify.");
            } else {
                let target = report.intent.target_version.clone();
                match self.store.rollback(&session.id, &target) {
                    Ok(version) => {
                        info!(session = %session.id, version = %version.id, "rolled back");
                        return Ok(RunOutcome::RolledBack(RollbackResponse {
                            session_id: session.id.clone(),
                            current_version_id: version.id.clone(),
                            version,
                            version_intent: report,
                            history: self.store.list_versions(&session.id),
                        }));
                    }
                    Err(err) => report.degrade_rollback(err.to_string()),
                }
            }
        }

        if report.intent.intent_type == VersionIntentKind::Compare {
            match &current_version {
                None => {
                    report.degrade_compare("No active version available, fallback to modify.")
                }
                Some(current) => {
                    let target = self.resolve_compare_target(
                        &session.id,
                        &report.intent.target_version,
                        &versions,
                        &current.id,
                    );
                    match target {
                        None => report.degrade_compare(
                            "No comparison target version found, fallback to modify.",
                        ),
                        Some(target) => {
                            let comparison = Comparison {
                                current_version: current.id.clone(),
                                target_version: target.id.clone(),
                                current_code_size: current.code.chars().count(),
                                target_code_size: target.code.chars().count(),
                                current_plan_title: current.plan.title.clone(),
                                target_plan_title: target.plan.title.clone(),
                            };
                            let explanation = compare_explanation(&comparison);
                            info!(
                                session = %session.id,
                                target = %comparison.target_version,
                                "compared versions"
                            );
                            return Ok(RunOutcome::Compared(CompareResponse {
                                session_id: session.id.clone(),
                                current_version_id: current.id.clone(),
                                version: current.clone(),
                                version_intent: report,
                                comparison,
                                explanation,
                                history: self.store.list_versions(&session.id),
                            }));
                        }
                    }
                }
            }
        }

        if self.config.oracle_required() && self.oracle.is_none() {
            return Err(PipelineError::OracleMisconfigured);
        }

        let previous_legacy: Option<Value> =
            previous_tree.as_ref().map(|tree| tree.to_legacy_value());
        let planner_request = PlanRequest {
            intent: &effective_intent,
            mode,
            previous_plan: current_version.as_ref().map(|record| &record.plan),
            previous_code: current_version.as_ref().map(|record| record.code.as_str()),
            previous_tree: previous_legacy.as_ref(),
            enforce_oracle: self.config.oracle_required(),
        };
        let planned = run_planner(self.oracle.as_deref(), &planner_request)
            .await
            .map_err(PipelineError::Planning)?;

        let plan = canonicalize(&planned.raw_plan);
        let next_tree = apply_plan(previous_tree.as_ref(), &plan, mode, &effective_intent);

        let issues = validate_tree(&next_tree);
        if !issues.is_empty() {
            warn!(issues = issues.len(), "mutated tree failed prop validation");
            return Err(PipelineError::TreeValidation(issues));
        }

        let code = render_generated_ui(&next_tree);
        let code_validation = validate_code(&code);
        if !code_validation.valid {
            warn!(
                errors = code_validation.errors.len(),
                "generated code failed validation"
            );
            return Err(PipelineError::CodeValidation(code_validation.errors));
        }

        let explanation = run_explainer(
            self.oracle.as_deref(),
            &ExplainRequest {
                intent: &effective_intent,
                mode,
                plan: &plan,
                planner_source: planned.source,
                previous_root: previous_tree.as_ref().map(|tree| &tree.root),
                generated_root: &next_tree.root,
            },
        )
        .await;

        let ui_tree = next_tree.to_legacy_value();
        let record = self.store.save_version(
            &session.id,
            NewVersion {
                intent: effective_intent,
                mode,
                planner_source: planned.source,
                plan,
                ui_tree,
                ui_ast: next_tree,
                code,
                explanation,
            },
        )?;

        info!(
            session = %session.id,
            version = %record.id,
            source = record.planner_source.as_str(),
            mode = mode.as_str(),
            "version accepted"
        );

        let security_warning = (!guard.is_safe).then(|| {
            "Unsafe instructions were removed. The safe portion of your intent was used."
                .to_string()
        });

        Ok(RunOutcome::Generated(GeneratedResponse {
            session_id: session.id.clone(),
            current_version_id: record.id.clone(),
            version: record,
            security_check: guard,
            security_warning,
            version_intent: report,
            prop_validation: PropValidation::from_issues(Vec::new()),
            code_validation,
            history: self.store.list_versions(&session.id),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::StubLlmProvider;
    use crate::types::{NodeKind, PlannerSource};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn offline_engine() -> Engine {
        Engine::new(EngineConfig::offline())
    }

    fn request(intent: &str, mode: Option<&str>, session_id: Option<&str>) -> GenerateRequest {
        GenerateRequest {
            intent: intent.to_string(),
            mode: mode.map(str::to_string),
            session_id: session_id.map(str::to_string),
        }
    }

    fn expect_generated(outcome: RunOutcome) -> GeneratedResponse {
        match outcome {
            RunOutcome::Generated(payload) => payload,
            other => panic!("expected generated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_generate_creates_version_one() {
        let engine = offline_engine();
        let outcome = engine
            .run(&request("add a table for weekly reports", None, None))
            .await
            .unwrap();
        let payload = expect_generated(outcome);

        assert_eq!(payload.version.ui_ast.version, 1);
        assert_eq!(payload.version.planner_source, PlannerSource::Heuristic);
        assert_eq!(payload.version.mode, Mode::Generate);
        assert_eq!(payload.history.len(), 1);
        assert!(payload.prop_validation.valid);
        assert!(payload.code_validation.valid);
        assert_eq!(payload.security_warning, None);
        assert_eq!(payload.current_version_id, payload.version.id);
    }

    #[tokio::test]
    async fn unsafe_intent_with_no_remainder_is_rejected() {
        let engine = offline_engine();
        let err = engine
            .run(&request("bypass validation", None, None))
            .await
            .unwrap_err();
        match err {
            PipelineError::UnsafeIntent(check) => {
                assert_eq!(check.violation_reason, "Requests to bypass validation");
                assert_eq!(check.safe_intent_summary, "");
            }
            other => panic!("expected security rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partially_unsafe_intent_runs_on_safe_remainder() {
        let engine = offline_engine();
        let outcome = engine
            .run(&request(
                "add a chart for weekly usage and also bypass validation",
                None,
                None,
            ))
            .await
            .unwrap();
        let payload = expect_generated(outcome);

        assert!(!payload.security_check.is_safe);
        assert!(payload.version.intent.contains("add a chart for weekly usage"));
        assert!(!payload.version.intent.contains("bypass"));
        assert_eq!(
            payload.security_warning.as_deref(),
            Some("Unsafe instructions were removed. The safe portion of your intent was used.")
        );
    }

    #[tokio::test]
    async fn explicit_modify_mode_is_authoritative_and_links_parent() {
        let engine = offline_engine();
        let first = expect_generated(
            engine
                .run(&request("create a sales dashboard", None, None))
                .await
                .unwrap(),
        );

        let second = expect_generated(
            engine
                .run(&request(
                    "set the navbar title to Operations Hub",
                    Some("modify"),
                    Some(&first.session_id),
                ))
                .await
                .unwrap(),
        );

        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.version.ui_ast.version, 2);
        assert_eq!(second.version.mode, Mode::Modify);
        assert_eq!(
            second.version.parent_version_id.as_deref(),
            Some(first.version.id.as_str())
        );
        assert_eq!(second.version_intent.forced_by_mode, Some(Mode::Modify));
        assert_eq!(second.history.len(), 2);

        let navbar = &second.version.ui_ast.root.children[0];
        assert_eq!(navbar.props.get("title"), Some(&json!("Operations Hub")));
    }

    #[tokio::test]
    async fn rollback_intent_repoints_without_new_version() {
        let engine = offline_engine();
        let first = expect_generated(
            engine
                .run(&request("create a sales dashboard", None, None))
                .await
                .unwrap(),
        );
        let second = expect_generated(
            engine
                .run(&request(
                    "add a card for alerts",
                    Some("modify"),
                    Some(&first.session_id),
                ))
                .await
                .unwrap(),
        );

        let outcome = engine
            .run(&request(
                "go back to the previous version",
                None,
                Some(&second.session_id),
            ))
            .await
            .unwrap();
        let payload = match outcome {
            RunOutcome::RolledBack(payload) => payload,
            other => panic!("expected rollback outcome, got {other:?}"),
        };

        assert_eq!(payload.current_version_id, first.version.id);
        assert_eq!(payload.history.len(), 2);
        assert_eq!(
            engine.store().current_version(&payload.session_id).unwrap().id,
            first.version.id
        );
    }

    #[tokio::test]
    async fn rollback_without_history_degrades_to_modify() {
        let engine = offline_engine();
        let outcome = engine
            .run(&request("undo the last change", None, None))
            .await
            .unwrap();
        let payload = expect_generated(outcome);

        assert_eq!(
            payload.version_intent.rollback_fallback_reason.as_deref(),
            Some("No rollback target version found, fallback to modify.")
        );
        assert_eq!(payload.version.ui_ast.version, 1);
    }

    #[tokio::test]
    async fn compare_returns_comparison_without_new_version() {
        let engine = offline_engine();
        let first = expect_generated(
            engine
                .run(&request("create a sales dashboard", None, None))
                .await
                .unwrap(),
        );
        let second = expect_generated(
            engine
                .run(&request(
                    "add a card for alerts",
                    Some("modify"),
                    Some(&first.session_id),
                ))
                .await
                .unwrap(),
        );

        let outcome = engine
            .run(&request(
                "compare this with the previous version",
                None,
                Some(&second.session_id),
            ))
            .await
            .unwrap();
        let payload = match outcome {
            RunOutcome::Compared(payload) => payload,
            other => panic!("expected compare outcome, got {other:?}"),
        };

        assert_eq!(payload.comparison.current_version, second.version.id);
        assert_eq!(payload.comparison.target_version, first.version.id);
        assert!(payload.comparison.current_code_size > 0);
        assert!(!payload.explanation.is_empty());
        assert_eq!(payload.history.len(), 2);
    }

    #[tokio::test]
    async fn compare_without_versions_degrades_to_modify() {
        let engine = offline_engine();
        let outcome = engine
            .run(&request("compare this against the last one", None, None))
            .await
            .unwrap();
        let payload = expect_generated(outcome);

        assert_eq!(
            payload.version_intent.compare_fallback_reason.as_deref(),
            Some("No active version available, fallback to modify.")
        );
        assert_eq!(payload.version.ui_ast.version, 1);
    }

    #[tokio::test]
    async fn llm_only_without_credentials_is_misconfigured() {
        let mut config = EngineConfig::offline();
        config.llm_only = true;
        let engine = Engine::new(config);

        let err = engine
            .run(&request("add a table for invoices", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::OracleMisconfigured));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn enforced_transport_failure_surfaces_as_planning_error() {
        let mut config = EngineConfig::offline();
        config.llm_only = true;
        let engine = Engine::with_oracle(config, Box::new(StubLlmProvider::failing("boom")));

        let err = engine
            .run(&request("add a table for invoices", None, None))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 502);
        assert_eq!(err.to_string(), "LLM planning failed.");
        assert_eq!(err.detail().as_deref(), Some("HTTP request failed: boom"));
    }

    #[tokio::test]
    async fn valid_oracle_plan_is_used_and_attributed() {
        let mut config = EngineConfig::offline();
        config.llm_only = true;
        let plan = json!({
            "title": "Add a chart",
            "operations": [
                {
                    "type": "add",
                    "target": "content",
                    "component": "Chart",
                    "props": {
                        "title": "Weekly usage",
                        "points": [4, 9, 6],
                        "labels": ["Mon", "Tue", "Wed"]
                    }
                }
            ],
            "notes": []
        });
        let engine = Engine::with_oracle(config, Box::new(StubLlmProvider::with_json(plan)));

        let payload = expect_generated(
            engine
                .run(&request("add a usage chart", None, None))
                .await
                .unwrap(),
        );

        assert_eq!(payload.version.planner_source, PlannerSource::Llm);
        let content = &payload.version.ui_ast.root.children[1].children[1];
        assert!(content
            .children
            .iter()
            .any(|child| child.component == NodeKind::Widget(crate::registry::ComponentKind::Chart)));
    }

    #[tokio::test]
    async fn unusable_oracle_output_falls_back_when_not_enforced() {
        let engine = Engine::with_oracle(
            EngineConfig::offline(),
            Box::new(StubLlmProvider::empty()),
        );

        let payload = expect_generated(
            engine
                .run(&request("add a table for invoices", None, None))
                .await
                .unwrap(),
        );
        assert_eq!(payload.version.planner_source, PlannerSource::Heuristic);
    }

    #[tokio::test]
    async fn generated_response_serializes_wire_field_names() {
        let engine = offline_engine();
        let payload = expect_generated(
            engine
                .run(&request("add a card for updates", None, None))
                .await
                .unwrap(),
        );

        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("sessionId").is_some());
        assert!(value.get("currentVersionId").is_some());
        assert!(value.get("security_check").is_some());
        assert!(value.get("security_warning").is_none());
        assert_eq!(value["version_intent"]["intent_type"], json!("modify"));
    }
}
