//! Error types, layered per pipeline stage. Display strings are the
//! user-visible cause strings the service surfaces.

use thiserror::Error;

use crate::security::SecurityCheck;
use crate::validation::tree::PropIssue;

/// Legacy-shape tree conversion failures.
#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("legacy node must be an object")]
    NotAnObject,
    #[error("unknown component type: {0}")]
    UnknownComponent(String),
}

/// Transport-level oracle failures. Missing credentials and unparseable
/// content are `None` results, never errors.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("LLM API returned status {status}: {snippet}")]
    Http { status: u16, snippet: String },
}

/// Plan synthesis failures, surfaced when oracle-only mode is in force.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("LLM did not return a valid JSON plan.")]
    InvalidJson,
    #[error("LLM plan failed deterministic schema validation.")]
    SchemaRejected,
    #[error("{0}")]
    Oracle(String),
}

impl From<OracleError> for PlanningError {
    fn from(err: OracleError) -> Self {
        PlanningError::Oracle(err.to_string())
    }
}

/// Session/version store failures.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Session not found.")]
    SessionNotFound,
    #[error("Version not found.")]
    VersionNotFound,
}

/// Terminal pipeline failures; each maps onto a response class.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unsafe intent with no salvageable safe portion. Carries the full
    /// filter result so the caller can surface it.
    #[error("{}", .0.violation_reason)]
    UnsafeIntent(SecurityCheck),
    /// Oracle-only mode without credentials.
    #[error("LLM configuration missing.")]
    OracleMisconfigured,
    /// Oracle-only mode and the oracle path failed.
    #[error("LLM planning failed.")]
    Planning(#[source] PlanningError),
    /// The mutated tree violated the closed prop schema.
    #[error("Generated UI failed prop validation.")]
    TreeValidation(Vec<PropIssue>),
    /// The generated code violated the token/import/pattern rules.
    #[error("Generated code failed validation.")]
    CodeValidation(Vec<String>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Default status mapping; individual service endpoints may narrow it.
    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::UnsafeIntent(_) => 400,
            PipelineError::OracleMisconfigured => 500,
            PipelineError::Planning(_) => 502,
            PipelineError::TreeValidation(_) => 400,
            PipelineError::CodeValidation(_) => 400,
            PipelineError::Store(StoreError::SessionNotFound) => 404,
            PipelineError::Store(StoreError::VersionNotFound) => 400,
        }
    }

    /// Detail string accompanying the error, when one exists.
    pub fn detail(&self) -> Option<String> {
        match self {
            PipelineError::Planning(cause) => Some(cause.to_string()),
            PipelineError::OracleMisconfigured => Some(
                "Set OPENAI_API_KEY or GEMINI_API_KEY, or disable LLM_ONLY.".to_string(),
            ),
            _ => None,
        }
    }
}
