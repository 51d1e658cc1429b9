//! Recovery of structured records from raw generation output.
//!
//! Generation output is unreliable: models narrate before answering, wrap
//! the answer in markdown fences, and sometimes emit several candidate
//! objects while "thinking out loud". Extraction tries ordered strategies
//! and treats "nothing parseable" as a legitimate outcome, not an error.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::summary::StructuredSummary;

/// Locate and parse the JSON object embedded in `raw`, if any.
///
/// Strategy 1 scans ```json fenced blocks and tries candidates in reverse
/// discovery order: a model's final fenced answer, when present, supersedes
/// earlier attempts. Strategy 2 falls back to a balanced-brace scan over
/// the whole text, again trying the last complete top-level object first.
/// Candidates that fail to parse are skipped silently; the first candidate
/// that parses wins. Returns `None` when nothing parses.
pub fn extract_json_object(raw: &str) -> Option<Value> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    for candidate in fenced_candidates(text).iter().rev() {
        if let Some(value) = parse_candidate(candidate) {
            return Some(value);
        }
    }

    for candidate in brace_candidates(text).iter().rev() {
        if let Some(value) = parse_candidate(candidate) {
            return Some(value);
        }
    }

    None
}

/// Extract a [`StructuredSummary`] from raw generation output.
pub fn extract_structured_summary(raw: &str) -> Option<StructuredSummary> {
    extract_json_object(raw).and_then(|value| StructuredSummary::from_value(&value))
}

fn fenced_candidates(text: &str) -> Vec<&str> {
    let fence = Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("invalid fence regex");
    fence
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|span| span.as_str())
        .collect()
}

/// Every maximal substring that opens at brace depth 0 and closes back to
/// depth 0 is a candidate. Nested braces stay inside their parent, so only
/// complete top-level objects are collected; stray closers are ignored.
fn brace_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (index, ch) in text.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(open) = start.take() {
                            candidates.push(&text[open..=index]);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    candidates
}

/// Parse one candidate with a lenient JSON5 parser (trailing commas and
/// comments are tolerated). Anything that is not an object is rejected.
fn parse_candidate(candidate: &str) -> Option<Value> {
    match json5::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(err) => {
            debug!("Skipping unparseable candidate: {}", err);
            None
        }
    }
}
