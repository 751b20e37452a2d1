//! Narrow interfaces to the collaborators the engine depends on but does not
//! own: custom rule storage, operation history and artifact storage.
//!
//! In-memory implementations back the CLI and the tests.

use crate::errors::{CollaboratorError, ConverterError};
use crate::formats::Format;
use crate::model_type::ModelType;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, RwLock};

/// A user-defined rule as held by external storage. Enumerated fields are
/// raw strings; they are coerced when merged into the rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRuleRecord {
    pub rule_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule_type: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub field_path: String,
    #[serde(default)]
    pub constraint_details: String,
    #[serde(default)]
    pub applicable_model_types: Option<Vec<String>>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Read access to stored custom rules.
pub trait CustomRuleStore: Send + Sync {
    fn all_custom_rules(&self) -> Result<Vec<CustomRuleRecord>, CollaboratorError>;

    fn enabled_custom_rules(&self) -> Result<Vec<CustomRuleRecord>, CollaboratorError>;

    /// Enabled rules whose stored model-type list names `model_type`.
    fn custom_rules_for_model_type(
        &self,
        model_type: &str,
    ) -> Result<Vec<CustomRuleRecord>, CollaboratorError>;
}

/// Kind of operation written to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Convert,
    Validate,
    BatchConvert,
    BatchValidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub operation_type: OperationType,
    pub file_name: String,
    pub success: bool,
    pub details: String,
    pub duration_ms: u64,
    pub actor: String,
    pub recorded_at: DateTime<Utc>,
}

pub trait HistoryRecorder: Send + Sync {
    fn record(&self, record: &HistoryRecord) -> Result<(), CollaboratorError>;
}

pub trait ArtifactStore: Send + Sync {
    fn save(
        &self,
        actor: &str,
        file_name: &str,
        content: &str,
        model_type: ModelType,
        format: Format,
    ) -> Result<(), CollaboratorError>;
}

/// Run a side effect whose failure must not affect the caller's result.
/// Failures are logged and discarded.
pub fn best_effort<F>(label: &str, effect: F)
where
    F: FnOnce() -> Result<(), CollaboratorError>,
{
    if let Err(e) = effect() {
        warn!("Ignoring failed {}: {}", label, e);
    }
}

/// Custom rules held in memory, optionally loaded from a JSON array file.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<Vec<CustomRuleRecord>>,
}

impl InMemoryRuleStore {
    pub fn new(rules: Vec<CustomRuleRecord>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConverterError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConverterError::Io(e, format!("Failed to read custom rules: {}", path.display()))
        })?;
        let rules: Vec<CustomRuleRecord> = serde_json::from_str(&content).map_err(|e| {
            ConverterError::Config(path.to_path_buf(), format!("Invalid custom rules: {}", e))
        })?;
        Ok(Self::new(rules))
    }

    pub fn insert(&self, rule: CustomRuleRecord) -> Result<(), CollaboratorError> {
        self.rules
            .write()
            .map_err(|_| CollaboratorError::new("custom rule store", "lock poisoned"))?
            .push(rule);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<CustomRuleRecord>, CollaboratorError> {
        self.rules
            .read()
            .map(|rules| rules.clone())
            .map_err(|_| CollaboratorError::new("custom rule store", "lock poisoned"))
    }
}

impl CustomRuleStore for InMemoryRuleStore {
    fn all_custom_rules(&self) -> Result<Vec<CustomRuleRecord>, CollaboratorError> {
        self.snapshot()
    }

    fn enabled_custom_rules(&self) -> Result<Vec<CustomRuleRecord>, CollaboratorError> {
        let mut rules = self.snapshot()?;
        rules.retain(|r| r.enabled);
        Ok(rules)
    }

    fn custom_rules_for_model_type(
        &self,
        model_type: &str,
    ) -> Result<Vec<CustomRuleRecord>, CollaboratorError> {
        let wanted = ModelType::recognize(model_type);
        let mut rules = self.enabled_custom_rules()?;
        rules.retain(|r| {
            r.applicable_model_types.as_ref().is_some_and(|types| {
                types.iter().any(|t| {
                    t == model_type || (wanted.is_some() && ModelType::recognize(t) == wanted)
                })
            })
        });
        Ok(rules)
    }
}

/// History kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl HistoryRecorder for InMemoryHistory {
    fn record(&self, record: &HistoryRecord) -> Result<(), CollaboratorError> {
        self.records
            .lock()
            .map_err(|_| CollaboratorError::new("history", "lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub actor: String,
    pub file_name: String,
    pub content: String,
    pub model_type: ModelType,
    pub format: Format,
}

/// Artifacts kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<Vec<StoredArtifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<StoredArtifact> {
        self.artifacts
            .lock()
            .map(|artifacts| artifacts.clone())
            .unwrap_or_default()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn save(
        &self,
        actor: &str,
        file_name: &str,
        content: &str,
        model_type: ModelType,
        format: Format,
    ) -> Result<(), CollaboratorError> {
        self.artifacts
            .lock()
            .map_err(|_| CollaboratorError::new("artifact store", "lock poisoned"))?
            .push(StoredArtifact {
                actor: actor.to_string(),
                file_name: file_name.to_string(),
                content: content.to_string(),
                model_type,
                format,
            });
        Ok(())
    }
}

/// Discards every history record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHistory;

impl HistoryRecorder for NoopHistory {
    fn record(&self, _record: &HistoryRecord) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Discards every artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopArtifactStore;

impl ArtifactStore for NoopArtifactStore {
    fn save(
        &self,
        _actor: &str,
        _file_name: &str,
        _content: &str,
        _model_type: ModelType,
        _format: Format,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
