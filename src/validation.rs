//! Validation module for OSCAL documents
//!
//! Baseline structural validation (parseability, root element, required
//! top-level fields) with findings that carry helpful messages and
//! suggestions. Rule-level findings come from [`crate::rules::evaluate`].

use crate::document::CanonicalDocument;
use crate::formats::{self, Format};
use crate::model_type::ModelType;
use colored::*;
use log::warn;
use serde::{Deserialize, Serialize};

/// Validation severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    fn recognize(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ERROR" => Some(Severity::Error),
            "WARNING" | "WARN" => Some(Severity::Warning),
            "INFO" => Some(Severity::Info),
            _ => None,
        }
    }

    /// Total conversion from stored strings; unknown values become `Warning`.
    pub fn coerce(s: &str) -> Self {
        Severity::recognize(s).unwrap_or_else(|| {
            warn!("Unknown severity '{}', defaulting to WARNING", s);
            Severity::Warning
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

/// A single validation finding with context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl ValidationFinding {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
            suggestion: None,
            rule_id: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Format the finding with colors for terminal output
    pub fn format_colored(&self) -> String {
        let mut output = String::new();

        let (icon, color_fn): (&str, fn(&str) -> ColoredString) = match self.severity {
            Severity::Error => ("✗", |s: &str| s.red().bold()),
            Severity::Warning => ("⚠", |s: &str| s.yellow().bold()),
            Severity::Info => ("ℹ", |s: &str| s.cyan().bold()),
        };

        output.push_str(&format!("{} ", color_fn(icon)));

        if let Some(ref rule_id) = self.rule_id {
            output.push_str(&format!("({}) ", rule_id.bright_black()));
        }

        if let Some(ref location) = self.location {
            output.push_str(&format!("[{}] ", location.bright_blue()));
        }

        output.push_str(&self.message);
        output.push('\n');

        if let Some(ref suggestion) = self.suggestion {
            output.push_str(&format!(
                "  {} {}\n",
                "→".bright_green(),
                suggestion.green()
            ));
        }

        output
    }

    /// Format without colors for logs or non-terminal output
    pub fn format_plain(&self) -> String {
        let mut output = format!("[{}] ", self.severity.as_str());

        if let Some(ref rule_id) = self.rule_id {
            output.push_str(&format!("({}) ", rule_id));
        }

        if let Some(ref location) = self.location {
            output.push_str(&format!("[{}] ", location));
        }

        output.push_str(&self.message);
        output.push('\n');

        if let Some(ref suggestion) = self.suggestion {
            output.push_str(&format!("  Suggestion: {}\n", suggestion));
        }

        output
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub findings: Vec<ValidationFinding>,
    pub model_type: ModelType,
    /// Model type named by the decoded root element, when recognized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_model_type: Option<ModelType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Appends findings and recomputes validity: a result is valid while it
    /// holds no error-severity finding.
    pub fn extend_findings(&mut self, findings: impl IntoIterator<Item = ValidationFinding>) {
        self.findings.extend(findings);
        self.valid = !self.has_errors();
    }

    /// Short human summary, e.g. for history records.
    pub fn summary(&self) -> String {
        if self.findings.is_empty() {
            return "No issues found".to_string();
        }
        format!(
            "{} errors, {} warnings, {} infos",
            self.count(Severity::Error),
            self.count(Severity::Warning),
            self.count(Severity::Info)
        )
    }

    /// The message of the first error finding, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.findings
            .iter()
            .find(|f| f.severity == Severity::Error)
            .map(|f| f.message.as_str())
    }

    /// Print the result with colors
    pub fn print_colored(&self) {
        if let Some(ref name) = self.file_name {
            println!("\n{} {}\n", "Validating:".bold(), name.bright_blue());
        }

        for finding in &self.findings {
            print!("{}", finding.format_colored());
        }

        if self.findings.is_empty() {
            println!("{}", "✓ No issues found".green().bold());
            return;
        }

        println!();
        let mut summary = Vec::new();
        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);
        let infos = self.count(Severity::Info);
        if errors > 0 {
            summary.push(
                format!("{} {}", errors, if errors == 1 { "error" } else { "errors" })
                    .red()
                    .bold()
                    .to_string(),
            );
        }
        if warnings > 0 {
            summary.push(
                format!(
                    "{} {}",
                    warnings,
                    if warnings == 1 { "warning" } else { "warnings" }
                )
                .yellow()
                .bold()
                .to_string(),
            );
        }
        if infos > 0 {
            summary.push(
                format!("{} {}", infos, if infos == 1 { "info" } else { "infos" })
                    .cyan()
                    .bold()
                    .to_string(),
            );
        }
        println!("{} {}", "Summary:".bold(), summary.join(", "));
    }

    /// Print without colors (for logs)
    pub fn print_plain(&self) {
        if let Some(ref name) = self.file_name {
            println!("\nValidating: {}\n", name);
        }
        for finding in &self.findings {
            print!("{}", finding.format_plain());
        }
        println!("{}", self.summary());
    }
}

/// Decode `content` and run the baseline structural checks.
///
/// Returns the decoded document alongside the result so callers can run
/// rule evaluation without decoding twice.
pub fn validate_document(
    content: &str,
    model_type: ModelType,
    format: Format,
) -> (ValidationResult, Option<CanonicalDocument>) {
    let mut result = ValidationResult {
        valid: true,
        findings: Vec::new(),
        model_type,
        detected_model_type: None,
        format: Some(format),
        file_name: None,
    };

    match formats::decode(content, format) {
        Ok(doc) => {
            result.detected_model_type = ModelType::classify(&doc);
            result.extend_findings(check_structure(&doc, model_type));
            (result, Some(doc))
        }
        Err(e) => {
            result.extend_findings([ValidationFinding::error(e.to_string())
                .with_suggestion(format!(
                    "Ensure the document is well-formed {}",
                    format.extension().to_uppercase()
                ))]);
            (result, None)
        }
    }
}

/// Structural checks every OSCAL document must pass regardless of rules.
pub fn check_structure(doc: &CanonicalDocument, model_type: ModelType) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let root = &doc.root;

    if root.name != model_type.as_str() {
        let detected = ModelType::classify(doc)
            .map(|t| format!(" (document looks like a {})", t))
            .unwrap_or_default();
        findings.push(
            ValidationFinding::error(format!(
                "Expected root element '{}', found '{}'{}",
                model_type.as_str(),
                root.name,
                detected
            ))
            .with_location(format!("/{}", root.name))
            .with_suggestion("Declare the model type that matches the document"),
        );
        return findings;
    }

    if root.field("uuid").is_none() {
        findings.push(
            ValidationFinding::error("Missing required field: uuid")
                .with_location(format!("/{}", root.name))
                .with_suggestion("Add a uuid identifying this document instance"),
        );
    }

    if root.child("metadata").is_none() {
        findings.push(
            ValidationFinding::error("Missing required field: metadata")
                .with_location(format!("/{}", root.name))
                .with_suggestion("Add a metadata section with title, version and oscal-version"),
        );
    }

    findings
}
