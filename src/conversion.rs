//! Conversion between OSCAL serializations through the canonical tree.

use crate::errors::ConverterError;
use crate::formats::{self, Format};
use crate::model_type::ModelType;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A request to re-serialize one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub content: String,
    pub model_type: ModelType,
    #[serde(default)]
    pub from_format: Option<Format>,
    #[serde(default)]
    pub to_format: Option<Format>,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl ConversionRequest {
    pub fn new(content: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            content: content.into(),
            model_type,
            from_format: None,
            to_format: None,
            file_name: None,
        }
    }

    pub fn from_format(mut self, format: Format) -> Self {
        self.from_format = Some(format);
        self
    }

    pub fn to_format(mut self, format: Format) -> Self {
        self.to_format = Some(format);
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// Outcome of a conversion. `content` is present exactly when `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub from_format: Format,
    pub to_format: Format,
    pub file_name: String,
}

impl ConversionResult {
    pub fn succeeded(content: String, from: Format, to: Format, file_name: String) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
            from_format: from,
            to_format: to,
            file_name,
        }
    }

    pub fn failed(error: impl Into<String>, from: Format, to: Format, file_name: String) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
            from_format: from,
            to_format: to,
            file_name,
        }
    }
}

/// Decode `content` as `from` and encode it as `to`.
///
/// Converting to the same format normalizes the document: indentation,
/// attribute quoting and key order come out the way the encoder writes them.
pub fn convert_content(content: &str, from: Format, to: Format) -> Result<String, ConverterError> {
    let doc = formats::decode(content, from)?;
    debug!(
        "Decoded <{}> with {} nodes from {}",
        doc.root_name(),
        doc.node_count(),
        from
    );
    formats::encode(&doc, to)
}

/// Name for a document written in `format`.
///
/// Without a supplied name this is `<model-type>.<ext>`. A supplied name
/// keeps its stem and takes the extension of `format`.
pub fn output_file_name(file_name: Option<&str>, model_type: ModelType, format: Format) -> String {
    match file_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => Path::new(name)
            .with_extension(format.extension())
            .to_string_lossy()
            .into_owned(),
        None => format!("{}.{}", model_type.as_str(), format.extension()),
    }
}
