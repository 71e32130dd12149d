//! Generated-code validation.
//!
//! The render code surface is a single function body expected to define
//! `renderGeneratedUI(React, components)`. Validation is a deterministic
//! denylist pass: I/O and dynamic-eval tokens, inline styles, Tailwind-like
//! utility classes, external UI libraries, non-local imports, and component
//! names outside the registry. Syntax is checked with a string-aware
//! bracket scan plus a return-statement check; no code is ever executed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::registry::ComponentKind;

const MAX_CODE_LEN: usize = 60_000;

const BLOCKED_TOKENS: [&str; 9] = [
    "fetch(",
    "XMLHttpRequest",
    "WebSocket",
    "eval(",
    "document.",
    "window.",
    "localStorage",
    "sessionStorage",
    "Function(",
];

static INLINE_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bstyle\s*:").unwrap());

static TAILWIND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)className\s*:\s*["'`][^"'`]*(\b(?:p|px|py|m|mx|my|mt|mb|ml|mr|pt|pb|pl|pr|text|bg|w|h|min|max|flex|grid|items|justify|gap|rounded|shadow|border)-[a-z0-9-]+\b)[^"'`]*["'`]"#,
    )
    .unwrap()
});

static EXTERNAL_UI_LIBS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?i)from\s+["'](@mui|antd|chakra-ui|semantic-ui|primereact|react-bootstrap)"#)
            .unwrap(),
        Regex::new(r"(?i)import\s+.*(MaterialUI|Antd|Chakra)").unwrap(),
    ]
});

static IMPORT_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\s+([^;]+)\s+from\s+["']([^"']+)["']"#).unwrap());

static CREATE_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"React\.createElement\((\w+)").unwrap());

/// Validation outcome. `error` is the first violation, or empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub error: String,
}

impl CodeValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        CodeValidation {
            valid: errors.is_empty(),
            error: errors.first().cloned().unwrap_or_default(),
            errors,
        }
    }
}

fn check_imports(code: &str, errors: &mut Vec<String>) {
    for caps in IMPORT_STATEMENT.captures_iter(code) {
        let source = &caps[2];
        if !source.starts_with('.') {
            errors.push(format!("External import is not allowed: {source}"));
        }
    }

    for caps in IMPORT_STATEMENT.captures_iter(code) {
        let clause = &caps[1];
        let Some(open) = clause.find('{') else { continue };
        let Some(close) = clause.rfind('}') else { continue };
        if close <= open {
            continue;
        }
        for name in clause[open + 1..close].split(',') {
            let name = name.trim().split(" as ").next().unwrap_or("").trim();
            if name.is_empty() || name == "React" {
                continue;
            }
            if ComponentKind::from_name(name).is_none() {
                errors.push(format!("Imported component is not allowed: {name}"));
            }
        }
    }
}

fn check_component_usage(code: &str, errors: &mut Vec<String>) {
    for caps in CREATE_ELEMENT.captures_iter(code) {
        let name = &caps[1];
        let capitalized = name.chars().next().map_or(false, |c| c.is_ascii_uppercase());
        if capitalized && ComponentKind::from_name(name).is_none() {
            errors.push(format!("Component not allowed: {name}"));
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Normal,
    Str(char),
    LineComment,
    BlockComment,
}

/// String- and comment-aware bracket balance scan.
fn scan_brackets(code: &str) -> Result<(), String> {
    let mut state = ScanState::Normal;
    let mut stack: Vec<char> = Vec::new();
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            ScanState::Normal => match c {
                '"' | '\'' | '`' => state = ScanState::Str(c),
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        state = ScanState::LineComment;
                    }
                    Some('*') => {
                        chars.next();
                        state = ScanState::BlockComment;
                    }
                    _ => {}
                },
                '(' | '[' | '{' => stack.push(c),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if stack.pop() != Some(expected) {
                        return Err("Unexpected closing bracket in generated code.".to_string());
                    }
                }
                _ => {}
            },
            ScanState::Str(quote) => {
                if c == '\\' {
                    chars.next();
                } else if c == quote {
                    state = ScanState::Normal;
                }
            }
            ScanState::LineComment => {
                if c == '\n' {
                    state = ScanState::Normal;
                }
            }
            ScanState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = ScanState::Normal;
                }
            }
        }
    }

    if matches!(state, ScanState::Str(_)) {
        return Err("Unterminated string literal in generated code.".to_string());
    }
    if !stack.is_empty() {
        return Err("Unbalanced brackets in generated code.".to_string());
    }
    Ok(())
}

fn syntax_check(code: &str) -> Result<(), String> {
    scan_brackets(code)?;
    if !code.contains("return") {
        return Err("renderGeneratedUI must contain a return statement.".to_string());
    }
    Ok(())
}

/// Validate generated render code against the denylist and registry.
pub fn validate_code(code: &str) -> CodeValidation {
    if code.is_empty() {
        return CodeValidation::from_errors(vec!["Generated code must be a string.".to_string()]);
    }

    let mut errors = Vec::new();

    if code.len() > MAX_CODE_LEN {
        errors.push("Generated code is too large.".to_string());
    }

    if !code.contains("function renderGeneratedUI") {
        errors.push("Code must define renderGeneratedUI(React, components).".to_string());
    }

    for token in BLOCKED_TOKENS {
        if code.contains(token) {
            errors.push(format!("Blocked token in generated code: {token}"));
        }
    }

    if INLINE_STYLE.is_match(code) {
        errors.push("Inline styles are not allowed.".to_string());
    }

    if TAILWIND_PATTERN.is_match(code) {
        errors.push("Tailwind-like utility classes are not allowed.".to_string());
    }

    for pattern in EXTERNAL_UI_LIBS.iter() {
        if pattern.is_match(code) {
            errors.push("External UI libraries are not allowed.".to_string());
            break;
        }
    }

    check_imports(code, &mut errors);
    check_component_usage(code, &mut errors);

    if let Err(message) = syntax_check(code) {
        errors.push(format!("Syntax validation failed: {message}"));
    }

    CodeValidation::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALID_SNIPPET: &str = r#"function renderGeneratedUI(React, components) {
  const { Navbar, Card } = components;
  return React.createElement("div", { className: "generated-page" },
    React.createElement(Navbar, { title: "Workspace", links: ["Home"] }),
    React.createElement(Card, { title: "Welcome", body: "Start here." })
  );
}"#;

    #[test]
    fn accepts_registry_only_render_code() {
        let result = validate_code(VALID_SNIPPET);
        assert_eq!(result.errors, Vec::<String>::new());
        assert!(result.valid);
        assert_eq!(result.error, "");
    }

    #[test]
    fn empty_input_is_rejected() {
        let result = validate_code("");
        assert_eq!(result.error, "Generated code must be a string.");
    }

    #[test]
    fn oversized_code_is_rejected() {
        let mut code = String::from("function renderGeneratedUI(React, components) { return null; }");
        code.push_str(&"/* pad */".repeat(10_000));
        let result = validate_code(&code);
        assert!(result.errors.contains(&"Generated code is too large.".to_string()));
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let result = validate_code("const x = 1;");
        assert!(result
            .errors
            .contains(&"Code must define renderGeneratedUI(React, components).".to_string()));
    }

    #[test]
    fn blocked_tokens_are_named() {
        let code = "function renderGeneratedUI(React, components) { fetch(\"/x\"); return null; }";
        let result = validate_code(code);
        assert_eq!(result.error, "Blocked token in generated code: fetch(");
    }

    #[test]
    fn inline_style_props_are_rejected() {
        let code = "function renderGeneratedUI(React, components) { return React.createElement(\"div\", { style: { color: \"red\" } }); }";
        let result = validate_code(code);
        assert!(result.errors.contains(&"Inline styles are not allowed.".to_string()));
    }

    #[test]
    fn tailwind_like_classes_are_rejected() {
        let code = "function renderGeneratedUI(React, components) { return React.createElement(\"div\", { className: \"p-4 bg-red-500\" }); }";
        let result = validate_code(code);
        assert!(result
            .errors
            .contains(&"Tailwind-like utility classes are not allowed.".to_string()));
    }

    #[test]
    fn generated_class_names_are_not_mistaken_for_utilities() {
        let code = "function renderGeneratedUI(React, components) { return React.createElement(\"div\", { className: \"generated-content\" }); }";
        assert!(validate_code(code).valid);
    }

    #[test]
    fn external_imports_are_rejected_by_source_and_name() {
        let code = "import { Button } from \"antd\";\nfunction renderGeneratedUI(React, components) { return null; }";
        let result = validate_code(code);
        assert!(result
            .errors
            .contains(&"External UI libraries are not allowed.".to_string()));
        assert!(result
            .errors
            .contains(&"External import is not allowed: antd".to_string()));
    }

    #[test]
    fn relative_import_of_registry_component_is_allowed() {
        let code = "import { Card } from \"./components\";\nfunction renderGeneratedUI(React, components) { return null; }";
        let result = validate_code(code);
        assert!(result.valid);
    }

    #[test]
    fn imported_non_registry_name_is_rejected() {
        let code = "import { Card, Carousel } from \"./components\";\nfunction renderGeneratedUI(React, components) { return null; }";
        let result = validate_code(code);
        assert_eq!(result.error, "Imported component is not allowed: Carousel");
    }

    #[test]
    fn off_registry_create_element_is_rejected() {
        let code = "function renderGeneratedUI(React, components) { return React.createElement(Hero, {}); }";
        let result = validate_code(code);
        assert_eq!(result.error, "Component not allowed: Hero");
    }

    #[test]
    fn lowercase_tags_are_not_component_usages() {
        let code = "function renderGeneratedUI(React, components) { return React.createElement(\"div\", null); }";
        assert!(validate_code(code).valid);
    }

    #[test]
    fn unbalanced_brackets_fail_syntax_check() {
        let code = "function renderGeneratedUI(React, components) { return React.createElement(\"div\", null; }";
        let result = validate_code(code);
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("Syntax validation failed:")));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let code = "function renderGeneratedUI(React, components) { return React.createElement(\"div\", { className: \"a)b}c\" }); }";
        assert!(validate_code(code).valid);
    }

    #[test]
    fn missing_return_fails_syntax_check() {
        let code = "function renderGeneratedUI(React, components) { React.createElement(\"div\", null); }";
        let result = validate_code(code);
        assert!(result
            .errors
            .contains(&"Syntax validation failed: renderGeneratedUI must contain a return statement.".to_string()));
    }
}
