//! Format detection and codec dispatch.
//!
//! OSCAL documents come in three interchangeable serializations: XML
//! (markup), JSON (tagged-object) and YAML (block-style). Each has a codec
//! module that decodes into, and encodes from, the canonical tree.

pub mod json;
mod object;
pub mod xml;
pub mod yaml;

use crate::document::CanonicalDocument;
use crate::errors::ConverterError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported OSCAL serializations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// XML (markup)
    Xml,
    /// JSON (tagged-object)
    Json,
    /// YAML (block-style)
    Yaml,
}

impl Format {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Result<Self, ConverterError> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                ConverterError::InvalidInput(format!(
                    "Could not determine file extension for: {}",
                    path.display()
                ))
            })?;

        match extension.to_lowercase().as_str() {
            "xml" => Ok(Format::Xml),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            ext => Err(ConverterError::UnsupportedFormat(format!(
                "Unsupported file format: .{}. Supported formats: .xml, .json, .yaml",
                ext
            ))),
        }
    }

    /// Detect format from file content.
    ///
    /// Markup starts with `<`, tagged-object with `{` or `[`. Anything else
    /// non-empty is treated as block-style.
    pub fn from_content(content: &[u8]) -> Result<Self, ConverterError> {
        let first = content
            .iter()
            .copied()
            .skip_while(|b| b.is_ascii_whitespace() || *b == 0xEF || *b == 0xBB || *b == 0xBF)
            .next();

        match first {
            None => Err(ConverterError::InvalidInput(
                "Empty file content".to_string(),
            )),
            Some(b'<') => Ok(Format::Xml),
            Some(b'{') | Some(b'[') => Ok(Format::Json),
            Some(_) => Ok(Format::Yaml),
        }
    }

    /// Resolve the format of a document: a declared format wins, then the file
    /// name's extension, then the content itself.
    pub fn resolve(
        declared: Option<Format>,
        file_name: Option<&str>,
        content: &str,
    ) -> Result<Self, ConverterError> {
        if let Some(format) = declared {
            return Ok(format);
        }
        let by_extension =
            file_name.and_then(|name| Format::from_extension(Path::new(name)).ok());
        if let Some(format) = by_extension {
            return Ok(format);
        }
        Format::from_content(content.as_bytes())
    }

    /// Get the typical file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xml" | "markup" => Ok(Format::Xml),
            "json" | "tagged-object" => Ok(Format::Json),
            "yaml" | "yml" | "block-style" => Ok(Format::Yaml),
            other => Err(ConverterError::UnsupportedFormat(format!(
                "Unknown format '{}'. Supported formats: xml, json, yaml",
                other
            ))),
        }
    }
}

/// Decode `content` in the declared `format` into the canonical tree.
pub fn decode(content: &str, format: Format) -> Result<CanonicalDocument, ConverterError> {
    match format {
        Format::Xml => xml::parse(content),
        Format::Json => json::parse(content),
        Format::Yaml => yaml::parse(content),
    }
}

/// Encode the canonical tree in `format`.
pub fn encode(doc: &CanonicalDocument, format: Format) -> Result<String, ConverterError> {
    match format {
        Format::Xml => xml::write(doc),
        Format::Json => json::write(doc),
        Format::Yaml => yaml::write(doc),
    }
}
