//! Plain-text synthesis report offered by `/api/export/summary`.

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::briefs::{BriefField, EditorialBrief};

const RULE_WIDTH: usize = 80;

pub fn summary_report(briefs: &[EditorialBrief], generated: DateTime<Local>) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = vec![
        heavy.clone(),
        "PEER REVIEW SYNTHESIS REPORT".to_string(),
        heavy.clone(),
        format!("\nGenerated: {}", generated.format("%Y-%m-%d %H:%M:%S")),
        format!("Total Briefs: {}", briefs.len()),
        format!("Validated: {}", briefs.iter().filter(|b| b.is_validated()).count()),
        format!("\n{}", heavy),
    ];

    for (i, brief) in briefs.iter().enumerate() {
        let raw = &brief.raw;
        out.push(format!(
            "\n\n[{}] {}",
            i + 1,
            brief.manuscript_title.present().map(String::as_str).unwrap_or("Unknown")
        ));
        out.push(light.clone());
        out.push(format!("Manuscript ID: {}", brief.id().unwrap_or("unknown")));
        out.push(format!("Reviews Synthesized: {}", field_text(&brief.num_reviews_synthesized)));
        out.push(format!("\nCONSENSUS:\n{}", block_text(raw.get("consensus_summary"), "N/A")));
        out.push(format!("\nMAJOR ISSUES:\n{}", block_text(raw.get("major_issues"), "None")));
        out.push(format!("\nACTION CHECKLIST:\n{}", block_text(raw.get("action_checklist"), "None")));
        out.push(format!(
            "\nVALIDATION: {}",
            match brief.validation_passed {
                BriefField::Present(true) => "✓ Passed",
                BriefField::Present(false) => "✗ Failed",
                _ => "? Not reported",
            }
        ));
        out.push(format!("Confidence: {}/100", field_text(&brief.confidence_score)));
    }

    out.join("\n")
}

fn field_text<T: std::fmt::Display>(field: &BriefField<T>) -> String {
    match field {
        BriefField::Present(v) => v.to_string(),
        BriefField::Missing => "missing".to_string(),
        BriefField::Invalid(_) => "invalid".to_string(),
    }
}

/// Strings as-is, lists one item per line, anything else as compact JSON.
fn block_text(value: Option<&Value>, default: &str) -> String {
    match value {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if items.is_empty() => default.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => format!("  - {}", s),
                Value::Object(obj) => match obj.get("issue").or_else(|| obj.get("item")).and_then(Value::as_str) {
                    Some(label) => format!("  - {}", label),
                    None => format!("  - {}", item),
                },
                other => format!("  - {}", other),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}
