//! Deterministic heuristic planner.
//!
//! The fallback engine when no oracle is available (or its output is
//! rejected). Everything here is a data-driven rule table over the intent
//! text: component cues, remove/minimal cues, dashboard templates for
//! generate mode, and targeted update parses for modify mode. The output is
//! a raw plan value in the same shape an oracle would produce; the caller
//! canonicalizes it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::registry::{infer_component_list, ComponentKind};
use crate::security::is_negated_instruction;
use crate::types::{Mode, OpType, Operation, Position};

static ADD_VERB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(add|include|insert|create)\b").unwrap());
static REMOVE_CUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(remove|delete)\b").unwrap());

static KPI_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:kpis?|cards?)\s*[:(]\s*([^).;\n]+)").unwrap());
static COLUMN_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcolumns?\s*:?\s+([^).;\n]+)").unwrap());
static BOARD_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:titled|called|named)\s+["']?([^"'.;\n]+)"#).unwrap());
static NAVBAR_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:navbar|header)\s+(?:title\s+)?to\s+["']?([^"'.;\n]+)"#).unwrap()
});
static SIDEBAR_ITEMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsidebar\s+(?:items?|links?|entries)\s*(?:to|:)?\s*([^.;\n]+)").unwrap()
});
static BUTTON_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:button|cta)\s+(?:label\s+|text\s+)?to\s+["']?([^"'.;\n]+)"#).unwrap()
});

/// Fixed layout parameters for one dashboard domain.
struct DashboardTemplate {
    cues: &'static [&'static str],
    navbar_title: &'static str,
    sidebar_items: &'static [&'static str],
    kpi_titles: [&'static str; 3],
    chart_title: &'static str,
    table_columns: &'static [&'static str],
    table_rows: &'static [&'static [&'static str]],
    button_label: &'static str,
}

const DASHBOARD_TEMPLATES: [DashboardTemplate; 3] = [
    DashboardTemplate {
        cues: &["project", "sprint", "task"],
        navbar_title: "Project Management Dashboard",
        sidebar_items: &["Overview", "Board", "Timeline", "Settings"],
        kpi_titles: ["Velocity", "Open Tasks", "Completed"],
        chart_title: "Sprint Burndown",
        table_columns: &["Task", "Owner", "Status"],
        table_rows: &[
            &["Design review", "Dana", "In Progress"],
            &["API cleanup", "Lee", "Done"],
        ],
        button_label: "New Task",
    },
    DashboardTemplate {
        cues: &["sales", "crm", "pipeline", "deal"],
        navbar_title: "Sales Dashboard",
        sidebar_items: &["Overview", "Pipeline", "Accounts", "Reports"],
        kpi_titles: ["Revenue", "Leads", "Win Rate"],
        chart_title: "Pipeline Value",
        table_columns: &["Deal", "Stage", "Owner"],
        table_rows: &[
            &["Acme renewal", "Negotiation", "Kim"],
            &["Globex upsell", "Discovery", "Ada"],
        ],
        button_label: "Add Deal",
    },
    DashboardTemplate {
        cues: &["healthcare", "health", "patient", "clinic"],
        navbar_title: "Healthcare Dashboard",
        sidebar_items: &["Overview", "Patients", "Schedule", "Reports"],
        kpi_titles: ["Patients", "Appointments", "Bed Occupancy"],
        chart_title: "Admissions",
        table_columns: &["Patient", "Department", "Status"],
        table_rows: &[
            &["J. Rivera", "Cardiology", "Admitted"],
            &["M. Chen", "Radiology", "Scheduled"],
        ],
        button_label: "New Appointment",
    },
];

fn dashboard_template(lower: &str) -> Option<&'static DashboardTemplate> {
    if !lower.contains("dashboard") {
        return None;
    }
    DASHBOARD_TEMPLATES
        .iter()
        .find(|template| template.cues.iter().any(|cue| lower.contains(cue)))
}

fn cue_present(pattern: &Regex, intent: &str) -> bool {
    pattern
        .find(intent)
        .map_or(false, |found| !is_negated_instruction(intent, found.start()))
}

/// Split a free-text list on commas and "and", trimming quotes.
fn split_list(raw: &str) -> Vec<String> {
    raw.replace(" and ", ",")
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn captured_list(pattern: &Regex, intent: &str) -> Vec<String> {
    pattern
        .captures(intent)
        .map(|caps| split_list(&caps[1]))
        .unwrap_or_default()
}

fn captured_text(pattern: &Regex, intent: &str) -> Option<String> {
    pattern
        .captures(intent)
        .map(|caps| caps[1].trim().to_string())
        .filter(|text| !text.is_empty())
}

fn props(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Pad or truncate each row to the column count.
fn fit_rows(rows: &[&[&str]], width: usize) -> Value {
    let fitted: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut cells: Vec<Value> = row.iter().take(width).map(|cell| json!(cell)).collect();
            while cells.len() < width {
                cells.push(json!(""));
            }
            Value::Array(cells)
        })
        .collect();
    Value::Array(fitted)
}

/// Fixed dashboard layout: navbar + sidebar + up to three KPI cards + chart
/// + table + button, parameterized where the intent parses.
fn dashboard_operations(template: &DashboardTemplate, intent: &str) -> Vec<Operation> {
    let mut operations = vec![Operation::new(OpType::Remove, "content:last")];

    let navbar_title = captured_text(&BOARD_TITLE, intent)
        .unwrap_or_else(|| template.navbar_title.to_string());
    operations.push(
        Operation::new(OpType::Update, "navbar")
            .with_component(ComponentKind::Navbar)
            .with_props(props(vec![("title", json!(navbar_title))]))
            .with_position(Position::Replace),
    );
    operations.push(
        Operation::new(OpType::Update, "sidebar")
            .with_component(ComponentKind::Sidebar)
            .with_props(props(vec![("items", json!(template.sidebar_items))]))
            .with_position(Position::Replace),
    );

    let parsed_kpis = captured_list(&KPI_LIST, intent);
    let kpi_titles: Vec<String> = if parsed_kpis.is_empty() {
        template.kpi_titles.iter().map(|t| t.to_string()).collect()
    } else {
        parsed_kpis.into_iter().take(3).collect()
    };
    for (index, title) in kpi_titles.iter().enumerate() {
        let mut card = Operation::new(OpType::Add, "content")
            .with_component(ComponentKind::Card)
            .with_props(props(vec![
                ("title", json!(title)),
                ("body", json!(format!("Latest {title} figures."))),
            ]));
        card.id = Some(format!("card_kpi_{}", index + 1));
        operations.push(card);
    }

    let mut chart_props = ComponentKind::Chart.default_props(intent);
    chart_props.insert("title".to_string(), json!(template.chart_title));
    operations.push(
        Operation::new(OpType::Add, "content")
            .with_component(ComponentKind::Chart)
            .with_props(chart_props),
    );

    let parsed_columns = captured_list(&COLUMN_LIST, intent);
    let columns: Vec<String> = if parsed_columns.is_empty() {
        template.table_columns.iter().map(|c| c.to_string()).collect()
    } else {
        parsed_columns.into_iter().take(6).collect()
    };
    operations.push(
        Operation::new(OpType::Add, "content")
            .with_component(ComponentKind::Table)
            .with_props(props(vec![
                ("columns", json!(columns)),
                ("rows", fit_rows(template.table_rows, columns.len())),
            ])),
    );

    operations.push(
        Operation::new(OpType::Add, "content:last")
            .with_component(ComponentKind::Button)
            .with_props(props(vec![
                ("label", json!(template.button_label)),
                ("variant", json!("primary")),
            ])),
    );

    operations
}

/// Update-only parses for modify mode: sidebar item lists, navbar title,
/// primary button label, and up to three KPI-card title rewrites.
fn targeted_modify_operations(intent: &str) -> Vec<Operation> {
    let mut operations = Vec::new();

    let sidebar_items = captured_list(&SIDEBAR_ITEMS, intent);
    if !sidebar_items.is_empty() {
        operations.push(
            Operation::new(OpType::Update, "sidebar")
                .with_component(ComponentKind::Sidebar)
                .with_props(props(vec![("items", json!(sidebar_items))]))
                .with_position(Position::Replace),
        );
    }

    if let Some(title) = captured_text(&NAVBAR_TITLE, intent) {
        operations.push(
            Operation::new(OpType::Update, "navbar")
                .with_component(ComponentKind::Navbar)
                .with_props(props(vec![("title", json!(title))]))
                .with_position(Position::Replace),
        );
    }

    if let Some(label) = captured_text(&BUTTON_LABEL, intent) {
        operations.push(
            Operation::new(OpType::Update, "content:button:last")
                .with_component(ComponentKind::Button)
                .with_props(props(vec![("label", json!(label))]))
                .with_position(Position::Replace),
        );
    }

    for (index, title) in captured_list(&KPI_LIST, intent).iter().take(3).enumerate() {
        operations.push(
            Operation::new(OpType::Update, format!("content:card:{}", index + 1))
                .with_component(ComponentKind::Card)
                .with_props(props(vec![("title", json!(title))]))
                .with_position(Position::Replace),
        );
    }

    operations
}

fn bucket(operations: &[Operation], op_type: OpType) -> Value {
    let filtered: Vec<&Operation> = operations.iter().filter(|op| op.op_type == op_type).collect();
    serde_json::to_value(filtered).unwrap_or_else(|_| json!([]))
}

fn assemble_raw_plan(mode: Mode, operations: Vec<Operation>, extra_note: Option<String>) -> Value {
    let is_generate = mode == Mode::Generate;
    let mut notes = vec![json!("Used deterministic component whitelist.")];
    notes.push(if is_generate {
        json!("Started from the fixed baseline layout.")
    } else {
        json!("Applied an incremental operation to the latest version.")
    });
    if let Some(note) = extra_note {
        notes.push(json!(note));
    }

    json!({
        "action": if is_generate { "generate" } else { "modify" },
        "updates": bucket(&operations, OpType::Update),
        "additions": bucket(&operations, OpType::Add),
        "removals": bucket(&operations, OpType::Remove),
        "layout_changes": [],
        "reasoning": "Heuristic fallback used deterministic minimal changes.",
        "title": if is_generate { "Initial UI generation" } else { "Incremental UI update" },
        "operations": serde_json::to_value(&operations).unwrap_or_else(|_| json!([])),
        "notes": Value::Array(notes),
    })
}

/// Build the deterministic fallback plan for an intent. Returns the raw
/// plan value; canonicalization happens in the caller.
pub fn build_heuristic_plan(intent: &str, mode: Mode) -> Value {
    let lower = intent.to_lowercase();

    if mode == Mode::Generate {
        if let Some(template) = dashboard_template(&lower) {
            let note = format!("Applied the {} template.", template.navbar_title.to_lowercase());
            return assemble_raw_plan(mode, dashboard_operations(template, intent), Some(note));
        }
    }

    let mut operations: Vec<Operation> = Vec::new();

    if cue_present(&REMOVE_CUE, intent) {
        operations.push(Operation::new(OpType::Remove, "content:last"));
    }

    let wants_minimal =
        lower.contains("minimal") || lower.contains("simple") || lower.contains("clean");
    if wants_minimal {
        operations.push(
            Operation::new(OpType::Update, "content:last")
                .with_component(ComponentKind::Card)
                .with_props(props(vec![
                    ("title", json!("Overview")),
                    ("body", json!("Minimal layout with focused content blocks.")),
                    ("footer", json!("Reduced visual noise")),
                ]))
                .with_position(Position::Replace),
        );
    }

    if mode.is_edit() {
        operations.extend(targeted_modify_operations(intent));
    }

    // A bare component mention in modify mode never appends a duplicate;
    // additions require an explicit, non-negated add verb.
    let allow_adds = mode == Mode::Generate || cue_present(&ADD_VERB, intent);
    if allow_adds {
        let mut components = infer_component_list(intent);
        if mode == Mode::Generate && components.is_empty() {
            components.push(ComponentKind::Card);
        }
        for kind in components {
            operations.push(
                Operation::new(OpType::Add, "content")
                    .with_component(kind)
                    .with_props(kind.default_props(intent)),
            );
        }
    }

    if operations.is_empty() {
        operations.push(
            Operation::new(OpType::Update, "content:last")
                .with_component(ComponentKind::Card)
                .with_props(ComponentKind::Card.default_props(intent))
                .with_position(Position::Replace),
        );
    }

    assemble_raw_plan(mode, operations, None)
}
