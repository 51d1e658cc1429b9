//! Rendering of a [`StructuredSummary`] into display markup.
//!
//! The formatter is a pure function: deterministic, side-effect-free, and
//! idempotent for equal input. It emits the semantic HTML tags that the
//! rich-text display layer maps onto its toolbar styles.

use std::collections::HashSet;

use crate::summary::{Medication, StructuredSummary, TermDefinition};

const SUMMARY_HEADER: &str = "<h2>Medical Summary</h2>";
const DISCLAIMER: &str =
    "<blockquote><b>⚠️ DISCLAIMER:</b> Not medical advice. Consult a professional.</blockquote>";

/// Escape a value for embedding in markup. Covers the five characters that
/// can change meaning inside tags or attributes.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Render a structured summary as section-based markup.
///
/// The header and disclaimer always come first. Each of the four sections
/// appears only when its list still has entries after sanitization, and the
/// section order is fixed regardless of input key order: takeaways,
/// medications, terms, questions. Every value is escaped before embedding,
/// and list entries are deduplicated by exact post-escape equality while
/// preserving first-seen order.
pub fn format_summary(summary: &StructuredSummary) -> String {
    let mut parts: Vec<String> = vec![SUMMARY_HEADER.to_string(), DISCLAIMER.to_string()];

    let takeaways = sanitized_items(&summary.key_takeaways);
    if !takeaways.is_empty() {
        parts.push("<h3>📌 Key Takeaways</h3><ul>".to_string());
        for item in &takeaways {
            parts.push(format!("<li>{}</li>", item));
        }
        parts.push("</ul>".to_string());
    }

    let medications = deduplicated(summary.medications.iter().map(render_medication));
    if !medications.is_empty() {
        parts.push("<h3>💊 Medications</h3>".to_string());
        parts.extend(medications);
        parts.push("<p><br></p>".to_string());
    }

    let terms = deduplicated(summary.medical_terms.iter().map(render_term));
    if !terms.is_empty() {
        parts.push("<h3>📖 Terms Explained</h3>".to_string());
        parts.extend(terms);
        parts.push("<p><br></p>".to_string());
    }

    let questions = sanitized_items(&summary.questions_for_provider);
    if !questions.is_empty() {
        parts.push("<h3>❓ Questions for Provider</h3><ol>".to_string());
        for question in &questions {
            parts.push(format!("<li>{}</li>", question));
        }
        parts.push("</ol><p><br></p>".to_string());
    }

    parts.concat()
}

fn render_medication(med: &Medication) -> String {
    let name = sanitized_field(&med.name).unwrap_or_else(|| "Unknown".to_string());
    let mut block = format!("<p><b>• {}</b></p>", name);
    if let Some(dosage) = sanitized_field(&med.dosage) {
        block.push_str(&format!(
            "<p style='margin-left: 20px;'>- Dosage: {}</p>",
            dosage
        ));
    }
    if let Some(administration) = sanitized_field(&med.administration) {
        block.push_str(&format!(
            "<p style='margin-left: 20px;'>- How to take: {}</p>",
            administration
        ));
    }
    if let Some(description) = sanitized_field(&med.description) {
        block.push_str(&format!(
            "<p style='margin-left: 20px;'><i>{}</i></p>",
            description
        ));
    }
    block
}

fn render_term(term: &TermDefinition) -> String {
    let name = sanitized_field(&term.term).unwrap_or_else(|| "Unknown".to_string());
    let definition = sanitized_field(&term.definition).unwrap_or_else(|| "N/A".to_string());
    format!("<p><b>{}</b>: {}</p>", name, definition)
}

/// Trim, escape, drop blanks, and deduplicate while keeping first-seen
/// order.
fn sanitized_items(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for item in items {
        let escaped = escape_html(item.trim());
        if escaped.is_empty() || !seen.insert(escaped.clone()) {
            continue;
        }
        result.push(escaped);
    }
    result
}

fn sanitized_field(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(escape_html)
}

fn deduplicated(blocks: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    blocks.filter(|block| seen.insert(block.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_renders_header_and_disclaimer_only() {
        let rendered = format_summary(&StructuredSummary::default());
        assert_eq!(rendered, format!("{}{}", SUMMARY_HEADER, DISCLAIMER));
    }

    #[test]
    fn empty_takeaway_list_omits_the_heading_entirely() {
        let summary = StructuredSummary {
            key_takeaways: vec![],
            ..Default::default()
        };
        let rendered = format_summary(&summary);
        assert!(!rendered.contains("Key Takeaways"));
        assert!(!rendered.contains("<ul>"));
    }

    #[test]
    fn duplicate_takeaways_collapse_preserving_order() {
        let summary = StructuredSummary {
            key_takeaways: vec![
                "Stop smoking".to_string(),
                "Stop smoking".to_string(),
                "Drink water".to_string(),
            ],
            ..Default::default()
        };
        let rendered = format_summary(&summary);
        assert_eq!(rendered.matches("<li>").count(), 2);
        let first = rendered.find("Stop smoking").unwrap();
        let second = rendered.find("Drink water").unwrap();
        assert!(first < second);
    }

    #[test]
    fn values_are_escaped_before_embedding() {
        let summary = StructuredSummary {
            key_takeaways: vec!["<script>alert('hi')</script> & more".to_string()],
            ..Default::default()
        };
        let rendered = format_summary(&summary);
        assert!(!rendered.contains("<script>"));
        assert!(rendered.contains("&lt;script&gt;alert(&#x27;hi&#x27;)&lt;/script&gt; &amp; more"));
    }

    #[test]
    fn medication_name_defaults_to_unknown_and_blank_sublines_are_dropped() {
        let summary = StructuredSummary {
            medications: vec![Medication {
                name: None,
                dosage: Some("500mg".to_string()),
                administration: Some("   ".to_string()),
                description: None,
            }],
            ..Default::default()
        };
        let rendered = format_summary(&summary);
        assert!(rendered.contains("<p><b>• Unknown</b></p>"));
        assert!(rendered.contains("- Dosage: 500mg"));
        assert!(!rendered.contains("How to take"));
        assert!(!rendered.contains("<i>"));
    }

    #[test]
    fn term_definition_defaults_to_placeholder() {
        let summary = StructuredSummary {
            medical_terms: vec![TermDefinition {
                term: Some("Hypertension".to_string()),
                definition: None,
            }],
            ..Default::default()
        };
        let rendered = format_summary(&summary);
        assert!(rendered.contains("<p><b>Hypertension</b>: N/A</p>"));
    }

    #[test]
    fn section_order_is_fixed() {
        let summary = StructuredSummary {
            questions_for_provider: vec!["Why this dose?".to_string()],
            medical_terms: vec![TermDefinition {
                term: Some("BP".to_string()),
                definition: Some("blood pressure".to_string()),
            }],
            medications: vec![Medication {
                name: Some("Lisinopril".to_string()),
                ..Default::default()
            }],
            key_takeaways: vec!["Check your blood pressure daily".to_string()],
        };
        let rendered = format_summary(&summary);
        let takeaways = rendered.find("Key Takeaways").unwrap();
        let medications = rendered.find("Medications").unwrap();
        let terms = rendered.find("Terms Explained").unwrap();
        let questions = rendered.find("Questions for Provider").unwrap();
        assert!(takeaways < medications && medications < terms && terms < questions);
    }

    #[test]
    fn formatting_is_idempotent_for_equal_input() {
        let summary = StructuredSummary {
            key_takeaways: vec!["Rest".to_string()],
            ..Default::default()
        };
        assert_eq!(format_summary(&summary), format_summary(&summary));
    }
}
