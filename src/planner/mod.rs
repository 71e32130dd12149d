//! Plan synthesis: oracle-backed when a provider is wired, deterministic
//! heuristics otherwise.
//!
//! The oracle path asks for JSON, lowers the modify dialect, and schema-
//! validates before trusting anything. Every failure class degrades to the
//! heuristic engine unless the caller requires oracle-only planning, in
//! which case the specific failure reason surfaces instead.

pub mod dialect;
pub mod heuristic;
pub mod prompt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::PlanningError;
use crate::oracle::LlmProvider;
use crate::types::{Mode, Plan, PlannerSource};
use crate::validation::validate_plan;

pub use dialect::{looks_like_modify_dialect, lower_modify_dialect};
pub use heuristic::build_heuristic_plan;
pub use prompt::{
    edit_explainer_prompt, explainer_prompt, planner_prompt, version_intent_prompt,
    PlannerPromptInput, VersionSummary,
};

/// Everything the planner needs from the request and session state.
pub struct PlanRequest<'a> {
    pub intent: &'a str,
    pub mode: Mode,
    pub previous_plan: Option<&'a Plan>,
    pub previous_code: Option<&'a str>,
    /// Legacy-shape previous tree; `None` when planning from scratch.
    pub previous_tree: Option<&'a Value>,
    /// Surface oracle failures instead of falling back.
    pub enforce_oracle: bool,
}

/// A raw (pre-canonicalization) plan plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOutcome {
    pub raw_plan: Value,
    pub source: PlannerSource,
}

/// Synthesize a raw plan. The caller canonicalizes the result; this layer
/// only decides *which* engine produced it.
pub async fn run_planner(
    oracle: Option<&dyn LlmProvider>,
    request: &PlanRequest<'_>,
) -> Result<PlannerOutcome, PlanningError> {
    let mut failure: Option<PlanningError> = None;

    if let Some(oracle) = oracle {
        let prompt = planner_prompt(&PlannerPromptInput {
            intent: request.intent,
            mode: request.mode,
            previous_plan: request.previous_plan,
            previous_code: request.previous_code,
            previous_tree: request.previous_tree,
        });

        match oracle.generate_json(&prompt).await {
            Ok(Some(raw)) => {
                let lowered = if request.mode.is_edit() {
                    lower_modify_dialect(&raw)
                } else {
                    raw
                };
                match validate_plan(&lowered) {
                    Ok(()) => {
                        debug!(mode = %request.mode.as_str(), "oracle plan accepted");
                        return Ok(PlannerOutcome {
                            raw_plan: lowered,
                            source: PlannerSource::Llm,
                        });
                    }
                    Err(reason) => {
                        debug!(%reason, "oracle plan rejected by schema validation");
                        failure = Some(PlanningError::SchemaRejected);
                    }
                }
            }
            Ok(None) => failure = Some(PlanningError::InvalidJson),
            Err(transport) => failure = Some(PlanningError::from(transport)),
        }
    }

    if let Some(failure) = failure {
        if request.enforce_oracle {
            return Err(failure);
        }
        warn!(reason = %failure, "falling back to heuristic planner");
    }

    Ok(PlannerOutcome {
        raw_plan: build_heuristic_plan(request.intent, request.mode),
        source: PlannerSource::Heuristic,
    })
}
