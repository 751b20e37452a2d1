//! OSCAL JSON (tagged-object) format handler

use super::object::{document_to_value, value_to_document};
use crate::document::CanonicalDocument;
use crate::errors::ConverterError;
use serde_json::Value;

/// Parse an OSCAL document from JSON
pub fn parse(content: &str) -> Result<CanonicalDocument, ConverterError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| ConverterError::Parse(format!("Failed to parse OSCAL JSON: {}", e)))?;
    value_to_document(value)
}

/// Write an OSCAL document as pretty-printed JSON
pub fn write(doc: &CanonicalDocument) -> Result<String, ConverterError> {
    serde_json::to_string_pretty(&document_to_value(doc)).map_err(|e| {
        ConverterError::Serialization(format!("Failed to write OSCAL JSON: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_minimal_catalog() {
        let json = r#"{
            "catalog": {
                "uuid": "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724",
                "metadata": {
                    "title": "Test Catalog",
                    "version": "1.0",
                    "oscal-version": "1.1.2"
                }
            }
        }"#;

        let doc = parse(json).unwrap();
        assert_eq!(doc.root_name(), "catalog");
        assert_eq!(
            doc.root.field("uuid"),
            Some("74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724")
        );
        assert_eq!(
            doc.root.child("metadata").unwrap().field("title"),
            Some("Test Catalog")
        );
    }

    #[test]
    fn test_parse_rejects_invalid_syntax() {
        let err = parse(r#"{"catalog": {"uuid": }"#).unwrap_err();
        assert!(err.to_string().contains("Failed to parse OSCAL JSON"));
    }

    #[test]
    fn test_write_then_parse_is_stable() {
        let json = concat!(
            r#"{"profile": {"@uuid": "p1", "import": "#,
            r##"[{"@href": "#a"}, {"@href": "#b"}]}}"##,
        );
        let doc = parse(json).unwrap();
        let written = write(&doc).unwrap();
        assert!(written.contains("\"profile\""));
        assert_eq!(parse(&written).unwrap(), doc);
    }
}
