//! OSCAL YAML (block-style) format handler
//!
//! YAML shares the object mapping used for JSON, so the document is read
//! straight into a `serde_json::Value` and written back from one.

use super::object::{document_to_value, value_to_document};
use crate::document::CanonicalDocument;
use crate::errors::ConverterError;
use serde_json::Value;

/// Parse an OSCAL document from YAML
pub fn parse(content: &str) -> Result<CanonicalDocument, ConverterError> {
    let value: Value = serde_yaml::from_str(content)
        .map_err(|e| ConverterError::Parse(format!("Failed to parse OSCAL YAML: {}", e)))?;
    value_to_document(value)
}

/// Write an OSCAL document as YAML
pub fn write(doc: &CanonicalDocument) -> Result<String, ConverterError> {
    serde_yaml::to_string(&document_to_value(doc)).map_err(|e| {
        ConverterError::Serialization(format!("Failed to write OSCAL YAML: {}", e))
    })
}
