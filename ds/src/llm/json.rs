//! JSON extraction from LLM responses
//!
//! Model output frequently wraps JSON in markdown fences or surrounds it with
//! prose. These helpers strip fences, try a direct parse, then fall back to the
//! first balanced object/array span in the text.

use serde_json::Value;
use tracing::debug;

use super::LlmError;

/// Length of the payload excerpt attached to parse failures
const EXCERPT_LEN: usize = 200;

/// Extract the first JSON object from `text`
pub fn extract_object(text: &str) -> Result<Value, LlmError> {
    debug!(text_len = text.len(), "extract_object: called");
    let stripped = strip_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(stripped)
        && value.is_object()
    {
        return Ok(value);
    }

    if let Some(span) = balanced_span(stripped, '{', '}')
        && let Ok(value) = serde_json::from_str::<Value>(span)
    {
        return Ok(value);
    }

    Err(parse_failure(text))
}

/// Extract the first JSON array from `text`
///
/// A bare object parses as a single-element array, matching the recommender's
/// tolerance for models that return one recommendation instead of a list.
pub fn extract_array(text: &str) -> Result<Vec<Value>, LlmError> {
    debug!(text_len = text.len(), "extract_array: called");
    let stripped = strip_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        match value {
            Value::Array(items) => return Ok(items),
            Value::Object(_) => return Ok(vec![value]),
            _ => {}
        }
    }

    if let Some(span) = balanced_span(stripped, '[', ']')
        && let Ok(Value::Array(items)) = serde_json::from_str::<Value>(span)
    {
        return Ok(items);
    }

    if let Some(span) = balanced_span(stripped, '{', '}')
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(span)
    {
        return Ok(vec![value]);
    }

    Err(parse_failure(text))
}

/// Remove a leading/trailing markdown code fence if present
fn strip_fences(text: &str) -> &str {
    let mut content = text.trim();

    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }

    content.trim()
}

/// First balanced `open`..`close` span, respecting JSON string literals
fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

fn parse_failure(text: &str) -> LlmError {
    let excerpt: String = text.chars().take(EXCERPT_LEN).collect();
    LlmError::InvalidResponse(format!("Could not extract valid JSON from response: {}", excerpt))
}
