//! Deterministic UI generation engine.
//!
//! Natural-language intents become immutable versions of a whitelisted
//! component tree. A security filter strips hostile instructions, a
//! planner (LLM-backed, with a deterministic heuristic fallback) emits a
//! canonical operation plan, tree mutation plus prop and code validation
//! gate every change, and a session store keeps the full version history
//! with rollback and compare.

pub mod canonical;
pub mod classifier;
pub mod codegen;
pub mod config;
pub mod errors;
pub mod explainer;
pub mod oracle;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod security;
pub mod service;
pub mod store;
pub mod tree_ops;
pub mod types;
pub mod validation;

// Re-export the surface most embedders need.
pub use config::EngineConfig;
pub use errors::{OracleError, PipelineError, PlanningError, StoreError, TreeError};
pub use oracle::{LlmProvider, OracleConfig, OracleFactory, OracleProviderType, StubLlmProvider};
pub use orchestrator::{Engine, GenerateRequest, RunOutcome};
pub use registry::{default_ui_tree, ComponentKind};
pub use service::{ApiResponse, UiService};
pub use store::SessionStore;
pub use types::{Mode, Plan, PlannerSource, Session, UiNode, UiTree, VersionRecord};
