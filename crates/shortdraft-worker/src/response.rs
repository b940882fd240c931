//! Structured extraction of JSON payloads from model output.
//!
//! Models often wrap their JSON in a code fence or a sentence of prose.
//! [`normalize`] peels that off, then [`parse_items`] checks the payload
//! against an [`ItemSchema`] before converting items to typed values.
//! Nothing past this module sees raw `serde_json::Value`s.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{WorkerError, WorkerResult};

const FENCE: &str = "```";

/// Expected shape of a `{"<collection>": [ {...}, ... ]}` response.
#[derive(Debug, Clone, Copy)]
pub struct ItemSchema<'a> {
    /// Name of the top-level array field
    pub collection: &'a str,
    /// Fields every item must carry
    pub required_fields: &'a [&'a str],
    /// Exact item count, when the caller asked for a fixed number
    pub expected_count: Option<usize>,
}

impl<'a> ItemSchema<'a> {
    pub fn items(required_fields: &'a [&'a str]) -> Self {
        Self {
            collection: "items",
            required_fields,
            expected_count: None,
        }
    }

    pub fn with_expected_count(mut self, count: usize) -> Self {
        self.expected_count = Some(count);
        self
    }
}

/// Strip a surrounding code fence (with optional language tag) and any
/// prose outside the JSON object.
pub fn normalize(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        // Drop the language tag line, e.g. ```json
        text = match rest.find('\n') {
            Some(newline) if !rest[..newline].contains('{') => &rest[newline + 1..],
            _ => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
        // The first closing fence ends the block; later fences belong to prose
        if let Some(end) = text.find(FENCE) {
            text = &text[..end];
        }
        return text.trim();
    }

    if let Some(open) = text.find(FENCE) {
        // Prose followed by a fenced block
        let inner = &text[open..];
        if inner[FENCE.len()..].contains(FENCE) {
            return normalize(inner);
        }
    }

    if !text.starts_with('{') {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                return text[start..=end].trim();
            }
        }
    }

    text
}

/// Parse a model response into typed items after validating its shape.
pub fn parse_items<T: DeserializeOwned>(raw: &str, schema: &ItemSchema<'_>) -> WorkerResult<Vec<T>> {
    let value: Value = serde_json::from_str(normalize(raw)).map_err(|e| WorkerError::MalformedResponse {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;

    let items = validate_items(&value, schema)?;

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(Value::Object(item.clone()))
                .map_err(|e| WorkerError::validation(format!("item {}: {}", index, e)))
        })
        .collect()
}

fn validate_items<'v>(value: &'v Value, schema: &ItemSchema<'_>) -> WorkerResult<Vec<&'v Map<String, Value>>> {
    let root = value
        .as_object()
        .ok_or_else(|| WorkerError::validation("top-level value is not a JSON object"))?;

    let collection = root
        .get(schema.collection)
        .ok_or_else(|| WorkerError::validation(format!("missing '{}' field", schema.collection)))?
        .as_array()
        .ok_or_else(|| WorkerError::validation(format!("'{}' is not an array", schema.collection)))?;

    if collection.is_empty() {
        return Err(WorkerError::validation(format!("'{}' is empty", schema.collection)));
    }

    if let Some(expected) = schema.expected_count {
        if collection.len() != expected {
            return Err(WorkerError::validation(format!(
                "expected {} {}, got {}",
                expected,
                schema.collection,
                collection.len()
            )));
        }
    }

    let mut items = Vec::with_capacity(collection.len());
    for (index, item) in collection.iter().enumerate() {
        let object = item
            .as_object()
            .ok_or_else(|| WorkerError::validation(format!("item {} is not an object", index)))?;

        for field in schema.required_fields {
            if object.get(*field).map_or(true, Value::is_null) {
                return Err(WorkerError::MissingField {
                    index,
                    field: field.to_string(),
                });
            }
        }
        items.push(object);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        a: String,
        b: String,
    }

    const FIELDS: &[&str] = &["a", "b"];

    fn body(n: usize) -> String {
        let items: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"a": "a{i}", "b": "b{i}"}}"#))
            .collect();
        format!(r#"{{"items": [{}]}}"#, items.join(","))
    }

    #[test]
    fn test_parses_plain_json() {
        let items: Vec<Item> = parse_items(&body(2), &ItemSchema::items(FIELDS)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].a, "a1");
    }

    #[test]
    fn test_fenced_matches_unfenced() {
        let schema = ItemSchema::items(FIELDS).with_expected_count(3);
        let plain: Vec<Item> = parse_items(&body(3), &schema).unwrap();

        for wrapped in [
            format!("```json\n{}\n```", body(3)),
            format!("```\n{}\n```", body(3)),
            format!("  ```JSON\n{}```  \n", body(3)),
            format!("Here you go:\n```json\n{}\n```\nEnjoy!", body(3)),
            format!("Sure! {} Hope that helps.", body(3)),
            format!("```json\n{}\n```\nTip: wrap it in ```code```", body(3)),
            format!("Here:\n```\n{}\n```\nUse ``` fences for code.", body(3)),
        ] {
            let parsed: Vec<Item> = parse_items(&wrapped, &schema).unwrap();
            assert_eq!(parsed, plain, "input: {wrapped}");
        }
    }

    #[test]
    fn test_malformed_keeps_raw_text() {
        let raw = "```json\n{\"items\": [ {\"a\": \n```";
        let err = parse_items::<Item>(raw, &ItemSchema::items(FIELDS)).unwrap_err();
        match err {
            WorkerError::MalformedResponse { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_count_mismatch_is_hard_failure() {
        let schema = ItemSchema::items(FIELDS).with_expected_count(10);
        for n in [9, 11] {
            let err = parse_items::<Item>(&body(n), &schema).unwrap_err();
            assert!(matches!(err, WorkerError::ResponseValidation(_)), "n = {n}");
        }
    }

    #[test]
    fn test_first_missing_field_reported() {
        let raw = r#"{"items": [{"a": "x", "b": "y"}, {"a": "x"}, {"b": "y"}]}"#;
        let err = parse_items::<Item>(raw, &ItemSchema::items(FIELDS)).unwrap_err();
        match err {
            WorkerError::MissingField { index, field } => {
                assert_eq!(index, 1);
                assert_eq!(field, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_field_counts_as_missing() {
        let raw = r#"{"items": [{"a": null, "b": "y"}]}"#;
        let err = parse_items::<Item>(raw, &ItemSchema::items(FIELDS)).unwrap_err();
        assert!(matches!(err, WorkerError::MissingField { index: 0, .. }));
    }

    #[test]
    fn test_structural_failures() {
        let schema = ItemSchema::items(FIELDS);
        for raw in [
            r#"[1, 2]"#,
            r#"{"other": []}"#,
            r#"{"items": {"a": "x"}}"#,
            r#"{"items": []}"#,
            r#"{"items": ["text"]}"#,
        ] {
            let err = parse_items::<Item>(raw, &schema).unwrap_err();
            assert!(matches!(err, WorkerError::ResponseValidation(_)), "raw: {raw}");
        }
    }

    #[test]
    fn test_wrong_field_type_is_validation_error() {
        let raw = r#"{"items": [{"a": 1, "b": "y"}]}"#;
        let err = parse_items::<Item>(raw, &ItemSchema::items(FIELDS)).unwrap_err();
        assert!(matches!(err, WorkerError::ResponseValidation(_)));
    }

    #[test]
    fn test_normalize_stops_at_first_closing_fence() {
        let raw = "```json\n{\"k\": 1}\n```\nTip: wrap it in ```code```";
        assert_eq!(normalize(raw), "{\"k\": 1}");
    }

    #[test]
    fn test_normalize_leaves_bare_json() {
        assert_eq!(normalize("  {\"k\": 1}\n"), "{\"k\": 1}");
    }
}
