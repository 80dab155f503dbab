//! CLI command implementations.

pub mod backup;
pub mod manager;
pub mod open;

use blazedb_core::{Document, Value};
use std::collections::BTreeMap;

/// Converts shell JSON input into a document value.
///
/// JSON has no timestamp or identifier literal, so those arrive as
/// numbers and strings; `null` is rejected because the value model has
/// no null variant.
pub(crate) fn json_to_value(json: &serde_json::Value) -> Result<Value, String> {
    match json {
        serde_json::Value::Null => Err("null values are not supported".to_string()),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(format!("number out of range: {n}"))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        serde_json::Value::Array(items) => {
            let mut seq = Vec::with_capacity(items.len());
            for item in items {
                seq.push(json_to_value(item)?);
            }
            Ok(Value::Seq(seq))
        }
        serde_json::Value::Object(fields) => {
            let mut map = BTreeMap::new();
            for (name, value) in fields {
                map.insert(name.clone(), json_to_value(value)?);
            }
            Ok(Value::Map(map))
        }
    }
}

/// Parses a JSON object into a document.
pub(crate) fn parse_document(input: &str) -> Result<Document, String> {
    let json: serde_json::Value =
        serde_json::from_str(input).map_err(|err| format!("invalid JSON: {err}"))?;
    match json_to_value(&json)? {
        Value::Map(fields) => Ok(Document::from_fields(fields)),
        _ => Err("a document must be a JSON object".to_string()),
    }
}

/// Renders a document value for the shell.
pub(crate) fn value_to_display(value: &Value) -> String {
    match value {
        Value::Text(s) => format!("{s:?}"),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Timestamp(t) => format!("@{t}"),
        Value::Id(id) => id.to_string(),
        Value::Seq(items) => {
            let rendered: Vec<String> = items.iter().map(value_to_display).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Map(fields) => {
            let rendered: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{name}: {}", value_to_display(value)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

/// Renders a document as one shell line.
pub(crate) fn document_to_display(doc: &Document) -> String {
    let rendered: Vec<String> = doc
        .iter()
        .map(|(name, value)| format!("{name}: {}", value_to_display(value)))
        .collect();
    format!("{{{}}}", rendered.join(", "))
}

/// Parses a shell probe value: JSON first, bare text as a fallback.
pub(crate) fn parse_probe_value(input: &str) -> Result<Value, String> {
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(json) => json_to_value(&json),
        Err(_) => Ok(Value::Text(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_scalars_convert() {
        assert_eq!(parse_probe_value("5").unwrap(), Value::Int(5));
        assert_eq!(parse_probe_value("1.5").unwrap(), Value::Float(1.5));
        assert_eq!(parse_probe_value("true").unwrap(), Value::Bool(true));
        assert_eq!(
            parse_probe_value("\"open\"").unwrap(),
            Value::Text("open".to_string())
        );
        // bare words fall back to text
        assert_eq!(
            parse_probe_value("open").unwrap(),
            Value::Text("open".to_string())
        );
    }

    #[test]
    fn documents_parse_from_objects_only() {
        let doc = parse_document(r#"{"title": "Fix crash", "severity": 3}"#).unwrap();
        assert_eq!(doc.get("title").unwrap().as_text(), Some("Fix crash"));
        assert_eq!(doc.get("severity").unwrap().as_int(), Some(3));

        assert!(parse_document("[1, 2]").is_err());
        assert!(parse_document("not json").is_err());
        assert!(parse_document(r#"{"bad": null}"#).is_err());
    }

    #[test]
    fn nested_structures_convert() {
        let doc = parse_document(r#"{"tags": ["a", "b"], "meta": {"n": 1}}"#).unwrap();
        assert!(matches!(doc.get("tags"), Some(Value::Seq(items)) if items.len() == 2));
        assert!(matches!(doc.get("meta"), Some(Value::Map(_))));
    }

    #[test]
    fn display_is_stable() {
        let doc = parse_document(r#"{"b": 2, "a": "x"}"#).unwrap();
        assert_eq!(document_to_display(&doc), "{a: \"x\", b: 2}");
    }
}
