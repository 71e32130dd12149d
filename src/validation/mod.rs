//! Deterministic validation surfaces.
//!
//! Everything here is pure: tree/prop checks against the closed component
//! registry, plan shape checks for oracle output, a token/import/pattern
//! denylist for generated render code, and the rule-matching layer that
//! turns raw validation errors into actionable feedback.

pub mod code;
pub mod feedback;
pub mod plan;
pub mod tree;

pub use code::{validate_code, CodeValidation};
pub use feedback::{build_validation_feedback, describe_issue, feedback_from_issues, ValidationFeedback};
pub use plan::validate_plan;
pub use tree::{validate_legacy, validate_tree, PropIssue, PropValidation};
