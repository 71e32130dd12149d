//! Validation feedback synthesis.
//!
//! Translates raw validation errors into a uniform, user-facing shape by
//! pattern-matching the primary error against known rule categories. This
//! is a deterministic lookup, not a model call, so feedback stays available
//! when the oracle is down.

use serde::Serialize;

use crate::validation::tree::PropIssue;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFeedback {
    pub what_went_wrong: String,
    pub rule_violated: String,
    pub how_to_fix: String,
    pub details: Vec<String>,
}

/// `{component}: {prop} - {issue}`, each segment skipped when empty.
pub fn describe_issue(issue: &PropIssue) -> String {
    let component = if issue.component.is_empty() {
        String::new()
    } else {
        format!("{}: ", issue.component)
    };
    let prop = if issue.prop.is_empty() {
        String::new()
    } else {
        format!("{} - ", issue.prop)
    };
    format!("{component}{prop}{}", issue.issue)
}

fn detect_rule(error_text: &str) -> &'static str {
    let text = error_text.to_lowercase();

    if text.contains("component not allowed") || text.contains("non-whitelisted") {
        return "Only approved components can be used.";
    }
    if text.contains("inline styles") {
        return "Inline styles are not allowed in deterministic output.";
    }
    if text.contains("tailwind") {
        return "Tailwind or utility-class generation is blocked.";
    }
    if text.contains("external") || text.contains("import") {
        return "External UI libraries are not allowed.";
    }
    if text.contains("missing required prop") {
        return "All required component props must be present.";
    }
    if text.contains("unknown prop") {
        return "Only schema-approved props are allowed.";
    }
    if text.contains("invalid prop type") {
        return "Component props must match required types.";
    }
    if text.contains("nested component misuse") {
        return "Components must follow the fixed layout/component hierarchy.";
    }
    if text.contains("syntax validation failed") {
        return "Generated React code must be syntactically valid.";
    }

    "Validation rules for deterministic generation were violated."
}

fn suggest_fix(error_text: &str) -> &'static str {
    let text = error_text.to_lowercase();

    if text.contains("component not allowed") || text.contains("non-whitelisted") {
        return "Ask for one of the approved components: Button, Card, Input, Table, Modal, Sidebar, Navbar, Chart.";
    }
    if text.contains("inline styles") || text.contains("tailwind") || text.contains("external") {
        return "Rephrase your request to focus on layout/content changes only, without custom styling or external libraries.";
    }
    if text.contains("missing required prop")
        || text.contains("invalid prop type")
        || text.contains("unknown prop")
    {
        return "Specify valid component props clearly (for example, Card needs title/body, Modal needs title/body/open/confirmLabel).";
    }
    if text.contains("syntax validation failed") {
        return "If editing code manually, keep the renderGeneratedUI function shape and valid React.createElement syntax.";
    }

    "Try a simpler request that modifies existing UI sections instead of changing system constraints."
}

/// Build feedback from flat error messages. The first message drives the
/// rule and fix lookup.
pub fn build_validation_feedback(errors: &[String]) -> ValidationFeedback {
    let details: Vec<String> = if errors.is_empty() {
        vec!["Unknown validation error.".to_string()]
    } else {
        errors.to_vec()
    };
    let primary = details[0].clone();

    ValidationFeedback {
        rule_violated: detect_rule(&primary).to_string(),
        how_to_fix: suggest_fix(&primary).to_string(),
        what_went_wrong: primary,
        details,
    }
}

/// Build feedback from structured tree/prop issues.
pub fn feedback_from_issues(issues: &[PropIssue]) -> ValidationFeedback {
    let messages: Vec<String> = issues.iter().map(describe_issue).collect();
    build_validation_feedback(&messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn issue_descriptions_include_component_and_prop() {
        let issue = PropIssue {
            component: "Card".to_string(),
            prop: "body".to_string(),
            issue: "Missing required prop".to_string(),
        };
        assert_eq!(describe_issue(&issue), "Card: body - Missing required prop");
    }

    #[test]
    fn missing_prop_maps_to_required_prop_rule() {
        let feedback = build_validation_feedback(&["Card: body - Missing required prop".to_string()]);
        assert_eq!(feedback.rule_violated, "All required component props must be present.");
        assert_eq!(
            feedback.how_to_fix,
            "Specify valid component props clearly (for example, Card needs title/body, Modal needs title/body/open/confirmLabel)."
        );
        assert_eq!(feedback.what_went_wrong, "Card: body - Missing required prop");
    }

    #[test]
    fn non_whitelisted_component_maps_to_registry_rule() {
        let feedback =
            build_validation_feedback(&["Plan uses non-whitelisted component: Carousel".to_string()]);
        assert_eq!(feedback.rule_violated, "Only approved components can be used.");
        assert!(feedback.how_to_fix.contains("Button, Card, Input, Table"));
    }

    #[test]
    fn tailwind_error_maps_to_utility_class_rule() {
        let feedback =
            build_validation_feedback(&["Tailwind-like utility classes are not allowed.".to_string()]);
        assert_eq!(feedback.rule_violated, "Tailwind or utility-class generation is blocked.");
    }

    #[test]
    fn syntax_error_maps_to_syntax_rule() {
        let feedback = build_validation_feedback(&[
            "Syntax validation failed: Unbalanced brackets in generated code.".to_string(),
        ]);
        assert_eq!(feedback.rule_violated, "Generated React code must be syntactically valid.");
        assert!(feedback.how_to_fix.contains("renderGeneratedUI"));
    }

    #[test]
    fn empty_errors_fall_back_to_unknown() {
        let feedback = build_validation_feedback(&[]);
        assert_eq!(feedback.what_went_wrong, "Unknown validation error.");
        assert_eq!(
            feedback.rule_violated,
            "Validation rules for deterministic generation were violated."
        );
        assert_eq!(feedback.details, vec!["Unknown validation error."]);
    }

    #[test]
    fn details_keep_every_error() {
        let errors = vec![
            "Inline styles are not allowed.".to_string(),
            "Component not allowed: Hero".to_string(),
        ];
        let feedback = build_validation_feedback(&errors);
        assert_eq!(feedback.details, errors);
        assert_eq!(feedback.rule_violated, "Inline styles are not allowed in deterministic output.");
    }
}
