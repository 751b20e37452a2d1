//! Defines the custom error types for the application.
//!
//! This uses `thiserror` for clean, boilerplate-free error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("I/O Error: {1} - {0}")]
    Io(#[source] std::io::Error, String),

    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("Unsupported Format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration Error in {0}: {1}")]
    Config(PathBuf, String),

    #[error("Collaborator Error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl From<std::io::Error> for ConverterError {
    fn from(err: std::io::Error) -> Self {
        ConverterError::Io(err, "IO operation failed".to_string())
    }
}

/// Failure reported by an external collaborator (rule store, history
/// recorder, artifact store).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{collaborator} unavailable: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}
