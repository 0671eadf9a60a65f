//! Boundary validation for JSON returned by the model.
//!
//! Model output is treated as an untyped payload until it has been checked against
//! the expected shape. [`parse`] never falls back to a default value: it either
//! yields [`StructuredOutput::Conforms`] or reports exactly why the payload was
//! rejected in [`StructuredOutput::Malformed`], keeping the raw text for logging.

use crate::chatroom::error::GenerationFailure;
use serde::de::DeserializeOwned;

/// Result of checking a model response against an expected shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput<T> {
    Conforms(T),
    Malformed { raw: String, reason: String },
}

impl<T> StructuredOutput<T> {
    /// Convert into a `Result`, mapping a malformed payload to
    /// [`GenerationFailure::Malformed`].
    pub fn into_result(self) -> Result<T, GenerationFailure> {
        match self {
            StructuredOutput::Conforms(value) => Ok(value),
            StructuredOutput::Malformed { reason, .. } => {
                Err(GenerationFailure::Malformed(reason))
            }
        }
    }

    pub fn is_conforming(&self) -> bool {
        matches!(self, StructuredOutput::Conforms(_))
    }
}

/// Locate the first balanced `{ ... }` object in `text`.
///
/// Models sometimes wrap JSON in prose or code fences. Braces inside string
/// literals are ignored while counting.
///
/// ```
/// use chatroom::structured::extract_json_object;
///
/// let text = "Sure! ```json\n{\"name\": \"Luna {the moon}\"}\n```";
/// assert_eq!(extract_json_object(text), Some("{\"name\": \"Luna {the moon}\"}"));
/// assert_eq!(extract_json_object("no json here"), None);
/// ```
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
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
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `raw` into `T`, accepting a JSON object embedded in surrounding text.
pub fn parse<T: DeserializeOwned>(raw: &str) -> StructuredOutput<T> {
    let malformed = |reason: String| StructuredOutput::Malformed {
        raw: raw.to_string(),
        reason,
    };

    let Some(object) = extract_json_object(raw) else {
        return malformed("no JSON object found in response".to_string());
    };

    match serde_json::from_str::<T>(object) {
        Ok(value) => StructuredOutput::Conforms(value),
        Err(e) => malformed(e.to_string()),
    }
}
