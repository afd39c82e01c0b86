//! Extraction of a `RawAnalysis` from model output.
//!
//! Tool-call arguments are parsed directly; free-text replies are scanned
//! for the outermost JSON object (first `{` to last `}`). Both paths
//! require the `foods`, `total_calories` and `analysis_confidence` keys
//! to be present before the value is accepted.

use serde_json::Value;
use thiserror::Error;

use super::types::RawAnalysis;

const REQUIRED_KEYS: [&str; 3] = ["foods", "total_calories", "analysis_confidence"];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in reply")]
    NoJson,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required key: {0}")]
    MissingKey(&'static str),
}

/// Parse the arguments string of a structured function call.
pub fn from_tool_arguments(arguments: &str) -> Result<RawAnalysis, ParseError> {
    let value: Value = serde_json::from_str(arguments)?;
    validate_required(&value)?;
    Ok(serde_json::from_value(value)?)
}

/// Scan free text for an embedded JSON object and parse it.
pub fn extract_embedded(text: &str) -> Result<RawAnalysis, ParseError> {
    let start = text.find('{').ok_or(ParseError::NoJson)?;
    let end = text.rfind('}').ok_or(ParseError::NoJson)?;
    if end < start {
        return Err(ParseError::NoJson);
    }
    let value: Value = serde_json::from_str(&text[start..=end])?;
    validate_required(&value)?;
    Ok(serde_json::from_value(value)?)
}

fn validate_required(value: &Value) -> Result<(), ParseError> {
    let obj = value.as_object().ok_or(ParseError::NoJson)?;
    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(ParseError::MissingKey(key));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_embedded_in_prose() {
        let text = r#"Here is the analysis you asked for:
            {"foods": [], "total_calories": 0, "analysis_confidence": 0.0}
            Let me know if you need anything else."#;
        let raw = extract_embedded(text).unwrap();
        assert!(raw.foods.is_empty());
        assert_eq!(raw.total_calories, 0.0);
        assert_eq!(raw.analysis_confidence, 0.0);
    }

    #[test]
    fn rejects_reply_without_braces() {
        let err = extract_embedded("I cannot analyze this image.").unwrap_err();
        assert!(matches!(err, ParseError::NoJson));
    }

    #[test]
    fn rejects_object_missing_required_keys() {
        let err = extract_embedded(r#"{"foods": [], "total_calories": 10}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingKey("analysis_confidence")));
    }

    #[test]
    fn rejects_malformed_json_between_braces() {
        let err = extract_embedded("{not json at all}").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn tool_arguments_parse_exactly() {
        let args = r#"{"foods":[{"name":"apple","estimated_grams":150,"calories_per_100g":52,"confidence":0.9}],
                       "total_calories":78,"analysis_confidence":0.9,"notes":"one apple"}"#;
        let raw = from_tool_arguments(args).unwrap();
        assert_eq!(raw.foods.len(), 1);
        assert_eq!(raw.foods[0].name, "apple");
        assert_eq!(raw.notes, "one apple");
    }

    #[test]
    fn tool_arguments_missing_keys_fail() {
        let err = from_tool_arguments(r#"{"total_calories": 5, "analysis_confidence": 0.5}"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingKey("foods")));
    }
}
