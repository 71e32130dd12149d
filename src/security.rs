//! Intent security filter.
//!
//! Scans raw user text against an ordered table of prohibited request
//! classes. Matches immediately preceded by a negation cue are voided,
//! so "don't use tailwind" is not a violation. Pure; failures are
//! classifications, never errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const SUMMARY_LIMIT: usize = 800;
const MAX_INTENT_CHARS: usize = 1200;
const MIN_INTENT_CHARS: usize = 3;
const NEGATION_WINDOW: usize = 16;

struct SecurityRule {
    reason: &'static str,
    patterns: Vec<Regex>,
}

fn rule(reason: &'static str, sources: &[&str]) -> SecurityRule {
    SecurityRule {
        reason,
        patterns: sources
            .iter()
            .map(|source| Regex::new(&format!("(?i){source}")).unwrap())
            .collect(),
    }
}

static SECURITY_RULES: Lazy<Vec<SecurityRule>> = Lazy::new(|| {
    vec![
        rule(
            "Requests to ignore deterministic component rules",
            &[
                r"\bignore\b.{0,80}\b(system|safety|component|deterministic|validation|rules?|constraints?|instructions?)\b",
                r"\bdisregard\b.{0,80}\b(system|safety|component|deterministic|validation|rules?|constraints?|instructions?)\b",
            ],
        ),
        rule(
            "Requests to generate CSS or Tailwind",
            &[
                r"\b(use|add|apply|generate|create)\b.{0,40}\btailwind\b",
                r"\b(generate|create|write|add|apply)\b.{0,40}\b(css|styles?)\b",
                r"\buse\b.{0,30}\binline styles?\b",
            ],
        ),
        rule(
            "Requests to create new components",
            &[
                r"\b(create|add|build|make|invent)\b.{0,40}\b(new|custom)\b.{0,20}\bcomponent\b",
                r"\bcreate\b.{0,30}\bcomponent\b",
            ],
        ),
        rule(
            "Requests to bypass validation",
            &[
                r"bypass validation",
                r"skip validation",
                r"disable validation",
            ],
        ),
        rule(
            "Requests to import external UI libraries",
            &[
                r"\b(import|use|add)\b.{0,40}\b(material ui|@mui|antd|chakra|semantic ui|primereact|react-bootstrap)\b",
                r"\buse\b.{0,30}\bexternal ui librar",
            ],
        ),
        rule(
            "Prompt injection markers",
            &[
                r"reveal hidden prompt",
                r"show system prompt",
                r"developer message",
                r"<script",
            ],
        ),
    ]
});

static LEADING_EDGE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s:;,.!?\-]+").unwrap());
static TRAILING_EDGE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s:;,.!?\-]+$").unwrap());

/// Result of scanning one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityCheck {
    pub is_safe: bool,
    pub violation_reason: String,
    pub safe_intent_summary: String,
}

impl SecurityCheck {
    fn unsafe_with(reason: &str, summary: String) -> Self {
        Self {
            is_safe: false,
            violation_reason: reason.to_string(),
            safe_intent_summary: summary,
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn take_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// A match is voided when the 16 chars before it contain a negation cue.
pub(crate) fn is_negated_instruction(message: &str, match_start: usize) -> bool {
    let prefix: String = message[..match_start]
        .chars()
        .rev()
        .take(NEGATION_WINDOW)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let prefix = prefix.to_lowercase();
    ["do not ", "don't ", "dont ", "never "]
        .iter()
        .any(|cue| prefix.contains(cue))
}

fn matches_rule(message: &str, rule: &SecurityRule) -> bool {
    for pattern in &rule.patterns {
        let Some(found) = pattern.find(message) else {
            continue;
        };
        if is_negated_instruction(message, found.start()) {
            continue;
        }
        return true;
    }
    false
}

/// Erase every rule-matching span (across all rules, negated or not) and
/// clean up what remains, so mixed prompts can still run on their safe
/// portion.
fn build_safe_intent_summary(message: &str) -> String {
    let mut sanitized = message.to_string();
    for rule in SECURITY_RULES.iter() {
        for pattern in &rule.patterns {
            sanitized = pattern.replace_all(&sanitized, " ").into_owned();
        }
    }

    let cleaned = sanitized
        .split('\n')
        .map(|line| {
            let line = LEADING_EDGE_PUNCT.replace(line, "");
            TRAILING_EDGE_PUNCT.replace(&line, "").trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    take_chars(&normalize_whitespace(&cleaned), SUMMARY_LIMIT)
}

/// Scan an intent. Hard constraints first (non-empty, length bounds), then
/// the rule table in order; the first rule with an unvoided match wins.
pub fn analyze_intent_security(user_intent: &str) -> SecurityCheck {
    let message = normalize_whitespace(user_intent);

    if message.is_empty() {
        return SecurityCheck::unsafe_with("Intent must be a non-empty string.", String::new());
    }

    let char_count = message.chars().count();
    if char_count < MIN_INTENT_CHARS {
        return SecurityCheck::unsafe_with("Intent is too short.", String::new());
    }
    if char_count > MAX_INTENT_CHARS {
        return SecurityCheck::unsafe_with("Intent is too long.", take_chars(&message, SUMMARY_LIMIT));
    }

    for rule in SECURITY_RULES.iter() {
        if matches_rule(&message, rule) {
            return SecurityCheck::unsafe_with(rule.reason, build_safe_intent_summary(&message));
        }
    }

    SecurityCheck {
        is_safe: true,
        violation_reason: String::new(),
        safe_intent_summary: message,
    }
}
