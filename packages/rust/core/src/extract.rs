//! Recover a JSON object embedded in free-text model output.
//!
//! Two strategies, in priority order:
//! 1. a fenced block labeled `json` that wraps an object;
//! 2. a single linear scan from the first `{` that tracks string and escape
//!    state, yielding the first brace-balanced candidate.
//!
//! Failure is an [`ExtractionError`], a recoverable outcome consumed by the
//! repair ladder. It never becomes an `ExplainerError`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Why no object could be recovered from a model response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no JSON object start found")]
    NoObject,

    #[error("no complete JSON object found")]
    Unbalanced,

    #[error("candidate is not valid JSON: {0}")]
    Invalid(String),

    #[error("extracted JSON value is not an object")]
    NotAnObject,
}

/// Extract the first JSON object from `text`.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ExtractionError> {
    static FENCED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)```json\s*(\{.*?\})\s*```").expect("valid regex"));

    let text = text.trim();

    if let Some(caps) = FENCED_RE.captures(text) {
        // An unparseable fence falls through to the scan.
        if let Ok(obj) = parse_object(&caps[1]) {
            return Ok(obj);
        }
    }

    let candidate = balanced_candidate(text)?;
    parse_object(candidate)
}

/// Return the substring from the first `{` to the point where brace depth
/// first returns to zero. Braces inside string literals are ignored and a
/// backslash inside a string always consumes the following character.
fn balanced_candidate(text: &str) -> Result<&str, ExtractionError> {
    let start = text.find('{').ok_or(ExtractionError::NoObject)?;

    let mut in_str = false;
    let mut escape = false;
    let mut depth = 0usize;

    // Structural characters are ASCII; byte offsets are char boundaries.
    for (i, byte) in text.bytes().enumerate().skip(start) {
        if in_str {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == b'"' {
                in_str = false;
            }
            continue;
        }

        match byte {
            b'"' => in_str = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    Err(ExtractionError::Unbalanced)
}

fn parse_object(candidate: &str) -> Result<Map<String, Value>, ExtractionError> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ExtractionError::NotAnObject),
        Err(e) => Err(ExtractionError::Invalid(e.to_string())),
    }
}
