//! The convert / validate / rules API.
//!
//! Every public operation returns a result value for caller-supplied
//! content; malformed documents produce failed results, not errors. History
//! and artifact writes are best-effort and never change a returned result.

use crate::collaborators::{
    best_effort, ArtifactStore, CustomRuleStore, HistoryRecord, HistoryRecorder,
    InMemoryRuleStore, NoopArtifactStore, NoopHistory, OperationType,
};
use crate::config::EngineConfig;
use crate::conversion::{self, ConversionRequest, ConversionResult};
use crate::document::CanonicalDocument;
use crate::formats::Format;
use crate::model_type::ModelType;
use crate::rules::{self, RuleCatalog, RuleMerger, ValidationRuleCategory, ValidationRulesResponse};
use crate::validation::{self, ValidationFinding, ValidationResult};
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// A request to validate one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub content: String,
    pub model_type: ModelType,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Also evaluate the built-in and custom rules for `model_type`.
    #[serde(default)]
    pub include_rules: bool,
}

impl ValidationRequest {
    pub fn new(content: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            content: content.into(),
            model_type,
            format: None,
            file_name: None,
            include_rules: false,
        }
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_rules(mut self) -> Self {
        self.include_rules = true;
        self
    }
}

pub struct OscalService {
    rules: RuleMerger,
    history: Arc<dyn HistoryRecorder>,
    artifacts: Arc<dyn ArtifactStore>,
    config: EngineConfig,
}

impl OscalService {
    pub fn new(
        catalog: Arc<RuleCatalog>,
        custom_rules: Arc<dyn CustomRuleStore>,
        history: Arc<dyn HistoryRecorder>,
        artifacts: Arc<dyn ArtifactStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rules: RuleMerger::new(catalog, custom_rules),
            history,
            artifacts,
            config,
        }
    }

    /// Built-in rules only, with history and artifacts discarded.
    pub fn standalone(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(RuleCatalog::builtin()),
            Arc::new(InMemoryRuleStore::default()),
            Arc::new(NoopHistory),
            Arc::new(NoopArtifactStore),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn convert(&self, request: &ConversionRequest, actor: &str) -> ConversionResult {
        let started = Instant::now();
        let to = request
            .to_format
            .unwrap_or(self.config.default_output_format);
        let source_name = |format: Format| {
            request.file_name.clone().unwrap_or_else(|| {
                conversion::output_file_name(None, request.model_type, format)
            })
        };
        let output_name =
            conversion::output_file_name(request.file_name.as_deref(), request.model_type, to);

        let from = match Format::resolve(
            request.from_format,
            request.file_name.as_deref(),
            &request.content,
        ) {
            Ok(from) => from,
            Err(e) => {
                let error = e.to_string();
                let source_name = source_name(to);
                self.record(
                    OperationType::Convert,
                    &source_name,
                    false,
                    &error,
                    elapsed_ms(started),
                    actor,
                );
                best_effort("artifact save", || {
                    self.artifacts
                        .save(actor, &source_name, &request.content, request.model_type, to)
                });
                return ConversionResult::failed(error, to, to, output_name);
            }
        };
        let source_name = source_name(from);

        info!(
            "Converting {} ({}) from {} to {}",
            source_name, request.model_type, from, to
        );
        let result = match conversion::convert_content(&request.content, from, to) {
            Ok(content) => ConversionResult::succeeded(content, from, to, output_name),
            Err(e) => ConversionResult::failed(e.to_string(), from, to, output_name),
        };

        let details = match &result.error {
            Some(error) => error.clone(),
            None => format!("Converted {} to {}", from, to),
        };
        self.record(
            OperationType::Convert,
            &source_name,
            result.success,
            &details,
            elapsed_ms(started),
            actor,
        );

        best_effort("artifact save", || {
            self.artifacts
                .save(actor, &source_name, &request.content, request.model_type, from)
        });
        if let Some(content) = &result.content {
            best_effort("artifact save", || {
                self.artifacts
                    .save(actor, &result.file_name, content, request.model_type, to)
            });
        }

        result
    }

    pub fn validate(&self, request: &ValidationRequest, actor: &str) -> ValidationResult {
        let started = Instant::now();
        let format = Format::resolve(
            request.format,
            request.file_name.as_deref(),
            &request.content,
        );

        let (mut result, format) = match format {
            Ok(format) => {
                let (mut result, doc) =
                    validation::validate_document(&request.content, request.model_type, format);
                if request.include_rules {
                    if let Some(doc) = doc {
                        self.apply_rules(&mut result, &doc);
                    }
                }
                (result, Some(format))
            }
            Err(e) => (
                ValidationResult {
                    valid: false,
                    findings: vec![ValidationFinding::error(e.to_string())],
                    model_type: request.model_type,
                    detected_model_type: None,
                    format: None,
                    file_name: None,
                },
                None,
            ),
        };

        let file_name = request.file_name.clone().unwrap_or_else(|| {
            conversion::output_file_name(
                None,
                request.model_type,
                format.unwrap_or(self.config.default_output_format),
            )
        });
        result.file_name = Some(file_name.clone());

        info!("Validated {}: {}", file_name, result.summary());
        self.record(
            OperationType::Validate,
            &file_name,
            result.valid,
            &result.summary(),
            elapsed_ms(started),
            actor,
        );
        best_effort("artifact save", || {
            self.artifacts.save(
                actor,
                &file_name,
                &request.content,
                request.model_type,
                format.unwrap_or(self.config.default_output_format),
            )
        });

        result
    }

    fn apply_rules(&self, result: &mut ValidationResult, doc: &CanonicalDocument) {
        if result.detected_model_type != Some(result.model_type) {
            debug!("Skipping rule evaluation: root element does not match the model type");
            return;
        }
        let applicable = self.rules.get_rules_for_model_type(result.model_type);
        debug!(
            "Evaluating {} rules for {}",
            applicable.rules.len(),
            result.model_type
        );
        result.extend_findings(rules::evaluate(doc, &applicable.rules));
    }

    pub fn get_all_rules(&self) -> ValidationRulesResponse {
        self.rules.get_all_rules()
    }

    pub fn get_rules_for_model_type(&self, model_type: ModelType) -> ValidationRulesResponse {
        self.rules.get_rules_for_model_type(model_type)
    }

    pub fn get_categories(&self) -> Vec<ValidationRuleCategory> {
        self.rules.get_categories()
    }

    /// Write one history record, discarding failures.
    pub(crate) fn record(
        &self,
        operation_type: OperationType,
        file_name: &str,
        success: bool,
        details: &str,
        duration_ms: u64,
        actor: &str,
    ) {
        let record = HistoryRecord {
            operation_type,
            file_name: file_name.to_string(),
            success,
            details: details.to_string(),
            duration_ms,
            actor: actor.to_string(),
            recorded_at: Utc::now(),
        };
        best_effort("history record", || self.history.record(&record));
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CustomRuleRecord, InMemoryArtifactStore, InMemoryHistory};
    use crate::errors::CollaboratorError;
    use crate::validation::Severity;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CATALOG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog uuid="74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724">
  <metadata>
    <title>Sample Catalog</title>
    <last-modified>2024-01-01T00:00:00Z</last-modified>
    <version>1.0</version>
    <oscal-version>1.1.2</oscal-version>
  </metadata>
  <group id="ac">
    <title>Access Control</title>
    <control id="ac-1">
      <title>Policy and Procedures</title>
    </control>
  </group>
</catalog>"#;

    #[derive(Default)]
    struct FailingHistory {
        calls: AtomicUsize,
    }

    impl HistoryRecorder for FailingHistory {
        fn record(&self, _record: &HistoryRecord) -> Result<(), CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::new("history", "disk full"))
        }
    }

    #[derive(Default)]
    struct FailingArtifacts {
        calls: AtomicUsize,
    }

    impl ArtifactStore for FailingArtifacts {
        fn save(
            &self,
            _actor: &str,
            _file_name: &str,
            _content: &str,
            _model_type: ModelType,
            _format: Format,
        ) -> Result<(), CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::new("artifact store", "bucket missing"))
        }
    }

    fn service_with(
        custom: Vec<CustomRuleRecord>,
    ) -> (OscalService, Arc<InMemoryHistory>, Arc<InMemoryArtifactStore>) {
        let history = Arc::new(InMemoryHistory::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let service = OscalService::new(
            Arc::new(RuleCatalog::builtin()),
            Arc::new(InMemoryRuleStore::new(custom)),
            history.clone(),
            artifacts.clone(),
            EngineConfig::default(),
        );
        (service, history, artifacts)
    }

    #[test]
    fn test_validate_well_formed_catalog() {
        let (service, history, artifacts) = service_with(Vec::new());
        let request = ValidationRequest::new(CATALOG_XML, ModelType::Catalog).format(Format::Xml);

        let result = service.validate(&request, "alice");
        assert!(result.valid);
        assert!(result.findings.is_empty());
        assert_eq!(result.file_name.as_deref(), Some("catalog.xml"));

        let records = history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation_type, OperationType::Validate);
        assert_eq!(records[0].actor, "alice");
        assert!(records[0].success);
        assert_eq!(artifacts.artifacts().len(), 1);
    }

    #[test]
    fn test_validate_unaffected_by_failing_side_effects() {
        let history = Arc::new(FailingHistory::default());
        let artifacts = Arc::new(FailingArtifacts::default());
        let service = OscalService::new(
            Arc::new(RuleCatalog::builtin()),
            Arc::new(InMemoryRuleStore::default()),
            history.clone(),
            artifacts.clone(),
            EngineConfig::default(),
        );

        let request = ValidationRequest::new(CATALOG_XML, ModelType::Catalog).format(Format::Xml);
        let result = service.validate(&request, "alice");
        assert!(result.valid);
        assert!(result.findings.is_empty());
        assert_eq!(history.calls.load(Ordering::SeqCst), 1);
        assert_eq!(artifacts.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validate_reports_parse_errors() {
        let (service, history, _) = service_with(Vec::new());
        let request = ValidationRequest::new("<catalog><metadata></catalog>", ModelType::Catalog)
            .file_name("broken.xml");

        let result = service.validate(&request, "bob");
        assert!(!result.valid);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].severity, Severity::Error);
        assert_eq!(result.format, Some(Format::Xml));
        assert!(!history.records()[0].success);
    }

    #[test]
    fn test_validate_empty_content() {
        let (service, _, _) = service_with(Vec::new());
        let result = service.validate(&ValidationRequest::new("  ", ModelType::Profile), "bob");
        assert!(!result.valid);
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn test_validate_with_rules_includes_custom_findings() {
        let custom = CustomRuleRecord {
            rule_id: "org-remarks".to_string(),
            name: "Remarks required".to_string(),
            description: String::new(),
            rule_type: "REQUIRED_FIELD".to_string(),
            severity: "ERROR".to_string(),
            category: "metadata".to_string(),
            field_path: "metadata/remarks".to_string(),
            constraint_details: String::new(),
            applicable_model_types: Some(vec!["catalog".to_string()]),
            enabled: true,
        };
        let (service, _, _) = service_with(vec![custom]);

        let plain = ValidationRequest::new(CATALOG_XML, ModelType::Catalog);
        assert!(service.validate(&plain, "carol").valid);

        let result = service.validate(&plain.clone().with_rules(), "carol");
        assert!(!result.valid);
        assert!(result
            .findings
            .iter()
            .any(|f| f.rule_id.as_deref() == Some("org-remarks")));
    }

    #[test]
    fn test_convert_records_history_and_artifacts() {
        let (service, history, artifacts) = service_with(Vec::new());
        let request = ConversionRequest::new(CATALOG_XML, ModelType::Catalog)
            .to_format(Format::Yaml)
            .file_name("sample.xml");

        let result = service.convert(&request, "dave");
        assert!(result.success);
        assert_eq!(result.from_format, Format::Xml);
        assert_eq!(result.to_format, Format::Yaml);
        assert_eq!(result.file_name, "sample.yaml");
        assert!(result.content.as_deref().unwrap().contains("catalog:"));

        assert_eq!(history.records().len(), 1);
        let saved: Vec<String> = artifacts
            .artifacts()
            .into_iter()
            .map(|a| a.file_name)
            .collect();
        assert_eq!(saved, vec!["sample.xml", "sample.yaml"]);
    }

    #[test]
    fn test_convert_failure_has_no_content() {
        let (service, history, artifacts) = service_with(Vec::new());
        let request = ConversionRequest::new("{\"catalog\": ", ModelType::Catalog);

        let result = service.convert(&request, "erin");
        assert!(!result.success);
        assert!(result.content.is_none());
        assert!(result.error.as_deref().unwrap().contains("Failed to parse OSCAL JSON"));
        assert_eq!(result.to_format, Format::Json);
        assert_eq!(result.file_name, "catalog.json");
        assert!(!history.records()[0].success);
        assert_eq!(artifacts.artifacts().len(), 1);
    }

    #[test]
    fn test_convert_of_unrecognizable_content_still_saves_original() {
        let (service, history, artifacts) = service_with(Vec::new());
        let request = ConversionRequest::new("   ", ModelType::Profile).to_format(Format::Yaml);

        let result = service.convert(&request, "erin");
        assert!(!result.success);
        assert!(result.content.is_none());
        assert_eq!(history.records().len(), 1);
        assert!(!history.records()[0].success);

        let saved = artifacts.artifacts();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].file_name, "profile.yaml");
        assert_eq!(saved[0].content, "   ");
    }

    #[test]
    fn test_convert_unaffected_by_failing_side_effects() {
        let history = Arc::new(FailingHistory::default());
        let artifacts = Arc::new(FailingArtifacts::default());
        let service = OscalService::new(
            Arc::new(RuleCatalog::builtin()),
            Arc::new(InMemoryRuleStore::default()),
            history.clone(),
            artifacts.clone(),
            EngineConfig::default(),
        );

        let request = ConversionRequest::new(CATALOG_XML, ModelType::Catalog);
        let result = service.convert(&request, "frank");
        assert!(result.success);
        assert_eq!(history.calls.load(Ordering::SeqCst), 1);
        assert_eq!(artifacts.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rules_api_delegates() {
        let (service, _, _) = service_with(Vec::new());
        assert_eq!(service.get_categories().len(), 9);
        assert_eq!(
            service.get_all_rules().rules.len(),
            RuleCatalog::builtin().len()
        );
        assert!(service
            .get_rules_for_model_type(ModelType::Profile)
            .rules
            .iter()
            .all(|r| r.applies_to(ModelType::Profile)));
    }
}
