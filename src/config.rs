//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config file.

use crate::errors::ConverterError;
use crate::formats::Format;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Upper bound on files of one batch processed at the same time.
    #[serde(default = "EngineConfig::default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Output format used when a conversion request names none.
    #[serde(default = "EngineConfig::default_output_format")]
    pub default_output_format: Format,

    /// Batch progress is logged every this many completed files.
    #[serde(default = "EngineConfig::default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: Self::default_max_concurrent_files(),
            default_output_format: Self::default_output_format(),
            progress_interval: Self::default_progress_interval(),
        }
    }
}

impl EngineConfig {
    fn default_max_concurrent_files() -> usize {
        8
    }

    fn default_output_format() -> Format {
        Format::Json
    }

    fn default_progress_interval() -> usize {
        10
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConverterError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConverterError::Io(e, format!("Failed to read config: {}", path.display()))
        })?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| ConverterError::Config(path.to_path_buf(), e.to_string()))?;
        config.validated(path)
    }

    fn validated(self, path: &Path) -> Result<Self, ConverterError> {
        if self.max_concurrent_files == 0 {
            return Err(ConverterError::Config(
                path.to_path_buf(),
                "maxConcurrentFiles must be at least 1".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(ConverterError::Config(
                path.to_path_buf(),
                "progressInterval must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}
