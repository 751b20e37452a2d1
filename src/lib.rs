//! Main library for the OSCAL converter.
//!
//! This crate converts OSCAL documents between their XML, JSON and YAML
//! serializations, validates them against built-in and custom rules, and
//! runs either operation over batches of documents concurrently.

pub mod batch;
pub mod collaborators;
pub mod config;
pub mod conversion;
pub mod document;
pub mod errors;
pub mod formats;
pub mod model_type;
pub mod progress;
pub mod rules;
pub mod service;
pub mod validation;

pub use batch::{BatchOperationKind, BatchOperationRequest, BatchOrchestrator, BatchResult};
pub use config::EngineConfig;
pub use conversion::{ConversionRequest, ConversionResult};
pub use document::{CanonicalDocument, Node};
pub use errors::ConverterError;
pub use formats::Format;
pub use model_type::ModelType;
pub use service::{OscalService, ValidationRequest};
pub use validation::{Severity, ValidationFinding, ValidationResult};

use log::debug;
use std::path::Path;

/// Read a document from disk as UTF-8 text.
pub fn read_document(path: &Path) -> Result<String, ConverterError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConverterError::Io(e, format!("Failed to read {}", path.display())))?;
    debug!("Read {} bytes from {}", content.len(), path.display());
    Ok(content)
}

/// Determine the model type of a document from its root element.
pub fn detect_model_type(content: &str, format: Format) -> Result<ModelType, ConverterError> {
    let doc = formats::decode(content, format)?;
    ModelType::classify(&doc).ok_or_else(|| {
        ConverterError::InvalidInput(format!(
            "Unrecognized root element '{}'; pass the model type explicitly",
            doc.root_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_document() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"<profile/>").unwrap();
        assert_eq!(read_document(file.path()).unwrap(), "<profile/>");
        assert!(matches!(
            read_document(Path::new("/nonexistent/profile.xml")),
            Err(ConverterError::Io(_, _))
        ));
    }

    #[test]
    fn test_detect_model_type() {
        assert_eq!(
            detect_model_type("<component-definition/>", Format::Xml).unwrap(),
            ModelType::ComponentDefinition
        );
        assert!(matches!(
            detect_model_type("<inventory/>", Format::Xml),
            Err(ConverterError::InvalidInput(_))
        ));
        assert!(matches!(
            detect_model_type("<inventory>", Format::Xml),
            Err(ConverterError::Parse(_))
        ));
    }
}
