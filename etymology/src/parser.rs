//! Parsing and validation of model output.
//!
//! The model is asked for a bare JSON object mapping each era to a list of
//! example strings. Models regularly wrap that in a markdown code fence, so
//! the fence is removed before parsing.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{EtymologyError, Result};

/// Era label → examples, in the order the model listed the eras.
pub type EvolutionResult = IndexMap<String, Vec<String>>;

/// Parse raw model text into per-era examples.
///
/// Missing or unexpected eras are not errors; the caller decides what to do
/// with a partial answer. Blank examples are dropped.
pub fn parse_response(raw: &str) -> Result<EvolutionResult> {
    let content = strip_code_fence(raw);

    let value: Value = serde_json::from_str(content).map_err(|e| {
        error!("Failed to parse LLM response as JSON: {e}");
        debug!("Raw content: {}", content.chars().take(500).collect::<String>());
        EtymologyError::MalformedResponse(format!("Invalid JSON response: {e}"))
    })?;

    let Value::Object(map) = value else {
        return Err(EtymologyError::MalformedResponse(
            "Response is not a JSON object".to_string(),
        ));
    };

    let mut result = EvolutionResult::with_capacity(map.len());
    for (era, examples) in map {
        let Value::Array(examples) = examples else {
            return Err(EtymologyError::MalformedResponse(format!(
                "Era '{era}' does not contain a list"
            )));
        };

        let mut texts = Vec::with_capacity(examples.len());
        for example in examples {
            let Value::String(text) = example else {
                return Err(EtymologyError::MalformedResponse(format!(
                    "Era '{era}' contains non-string examples"
                )));
            };
            let text = text.trim();
            if text.is_empty() {
                debug!("Dropping blank example for era '{era}'");
                continue;
            }
            texts.push(text.to_string());
        }
        result.insert(era, texts);
    }

    Ok(result)
}

/// Remove an enclosing markdown code fence and its optional `json` tag.
fn strip_code_fence(raw: &str) -> &str {
    let content = raw.trim();
    let Some(after_open) = content.strip_prefix("```") else {
        return content;
    };

    // Opening fence line, including any language tag written on it
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body).trim();

    // Tag placed on the first content line instead of the fence line
    body.strip_prefix("json").map_or(body, str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_object_keeps_era_order() {
        let raw = r#"{"2020s": ["data brokers track you"], "1900s": ["a closed door"]}"#;
        let result = parse_response(raw).unwrap();

        let eras: Vec<&str> = result.keys().map(String::as_str).collect();
        assert_eq!(eras, vec!["2020s", "1900s"]);
        assert_eq!(result["1900s"], vec!["a closed door".to_string()]);
    }

    #[test]
    fn test_parse_fenced_with_language_tag() {
        let raw = "```json\n{\"1900s\": [\"one\", \"two\"]}\n```";
        let result = parse_response(raw).unwrap();
        assert_eq!(result["1900s"].len(), 2);
    }

    #[test]
    fn test_parse_fenced_with_tag_on_content_line() {
        let raw = "```\njson\n{\"1900s\": [\"one\"]}\n```\n";
        let result = parse_response(raw).unwrap();
        assert_eq!(result["1900s"], vec!["one".to_string()]);
    }

    #[test]
    fn test_parse_fence_without_closing_line() {
        let raw = "```json\n{\"1900s\": [\"one\"]}";
        assert!(parse_response(raw).is_ok());
    }

    #[test]
    fn test_blank_examples_are_dropped() {
        let raw = r#"{"1900s": ["  ", "kept", ""]}"#;
        assert_eq!(parse_response(raw).unwrap()["1900s"], vec!["kept".to_string()]);
    }

    #[test]
    fn test_over_delivery_is_accepted() {
        let raw = r#"{"1900s": ["a", "b", "c", "d", "e", "f", "g"], "1700s": []}"#;
        let result = parse_response(raw).unwrap();
        assert_eq!(result["1900s"].len(), 7);
        assert!(result["1700s"].is_empty());
    }

    #[test]
    fn test_rejects_malformed_documents() {
        let cases = [
            r#"{"1900s": ["unbalanced""#,
            r#"["1900s", "2020s"]"#,
            r#"{"1900s": "not a list"}"#,
            r#"{"1900s": ["ok", 3]}"#,
            "Sure! Here are the examples you asked for.",
        ];

        for raw in cases {
            assert!(
                matches!(parse_response(raw), Err(EtymologyError::MalformedResponse(_))),
                "expected MalformedResponse for {raw}"
            );
        }
    }
}
