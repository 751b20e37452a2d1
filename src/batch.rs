//! Concurrent batch validation and conversion.
//!
//! `process_batch` returns as soon as the operation is registered. A driver
//! task runs the files on the blocking pool, bounded by a semaphore, and
//! publishes the completed result in a single insert. Pollers therefore see
//! either no file results or all of them, in input order.

use crate::collaborators::OperationType;
use crate::conversion::ConversionRequest;
use crate::formats::Format;
use crate::model_type::ModelType;
use crate::progress::BatchProgress;
use crate::service::{elapsed_ms, OscalService, ValidationRequest};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchOperationKind {
    Validate,
    Convert,
}

impl BatchOperationKind {
    fn history_type(&self) -> OperationType {
        match self {
            BatchOperationKind::Validate => OperationType::BatchValidate,
            BatchOperationKind::Convert => OperationType::BatchConvert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Accepted,
    Running,
    Completed,
}

/// One document of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFile {
    pub file_name: String,
    pub content: String,
    pub model_type: ModelType,
    #[serde(default)]
    pub format: Option<Format>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperationRequest {
    pub operation: BatchOperationKind,
    pub files: Vec<BatchFile>,
    /// Output format for `CONVERT` batches.
    #[serde(default)]
    pub target_format: Option<Format>,
}

/// Handle returned when a batch is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperation {
    pub operation_id: String,
    pub operation_kind: BatchOperationKind,
    pub total_files: usize,
    pub file_names: Vec<String>,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub file_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Converted content, for `CONVERT` batches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl FileResult {
    fn processing_error(file_name: String, message: &str, duration_ms: u64) -> Self {
        Self {
            file_name,
            success: false,
            error: Some(format!("Processing error: {}", message)),
            duration_ms,
            output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub operation_id: String,
    pub operation_kind: BatchOperationKind,
    pub status: BatchStatus,
    pub total_files: usize,
    /// `None` until every file has finished.
    pub results: Option<Vec<FileResult>>,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_duration_ms: u64,
    pub accepted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchResult {
    pub fn is_complete(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}

pub struct BatchOrchestrator {
    service: Arc<OscalService>,
    results: Arc<DashMap<String, BatchResult>>,
    permits: Arc<Semaphore>,
}

impl BatchOrchestrator {
    pub fn new(service: Arc<OscalService>) -> Self {
        let permits = Arc::new(Semaphore::new(service.config().max_concurrent_files.max(1)));
        Self {
            service,
            results: Arc::new(DashMap::new()),
            permits,
        }
    }

    /// Register a batch and start processing it in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn process_batch(&self, request: BatchOperationRequest, actor: &str) -> BatchOperation {
        let operation_id = Uuid::new_v4().to_string();
        let operation = BatchOperation {
            operation_id: operation_id.clone(),
            operation_kind: request.operation,
            total_files: request.files.len(),
            file_names: request.files.iter().map(|f| f.file_name.clone()).collect(),
            status: BatchStatus::Accepted,
        };

        self.results.insert(
            operation_id.clone(),
            BatchResult {
                operation_id: operation_id.clone(),
                operation_kind: request.operation,
                status: BatchStatus::Accepted,
                total_files: request.files.len(),
                results: None,
                success_count: 0,
                failure_count: 0,
                total_duration_ms: 0,
                accepted_at: Utc::now(),
                completed_at: None,
            },
        );
        info!(
            "Accepted batch {} ({:?}, {} files)",
            operation_id,
            request.operation,
            request.files.len()
        );

        let driver = BatchDriver {
            service: self.service.clone(),
            results: self.results.clone(),
            permits: self.permits.clone(),
            operation_id,
            actor: actor.to_string(),
        };
        tokio::spawn(driver.run(request));

        operation
    }

    pub fn get_batch_result(&self, operation_id: &str) -> Option<BatchResult> {
        self.results.get(operation_id).map(|entry| entry.value().clone())
    }

    /// Every known result, oldest first.
    pub fn get_all_batch_results(&self) -> Vec<BatchResult> {
        let mut all: Vec<BatchResult> = self
            .results
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|r| r.accepted_at);
        all
    }

    /// Drop completed results; batches still in flight are kept. Returns the
    /// number of results removed.
    pub fn clear_old_results(&self) -> usize {
        let before = self.results.len();
        self.results.retain(|_, result| !result.is_complete());
        let removed = before - self.results.len();
        debug!("Cleared {} completed batch results", removed);
        removed
    }

    /// Poll until the batch completes. `None` if the id is unknown or was
    /// cleared while waiting.
    pub async fn wait_for_completion(
        &self,
        operation_id: &str,
        poll_interval: Duration,
    ) -> Option<BatchResult> {
        loop {
            let current = self.get_batch_result(operation_id)?;
            if current.is_complete() {
                return Some(current);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

struct BatchDriver {
    service: Arc<OscalService>,
    results: Arc<DashMap<String, BatchResult>>,
    permits: Arc<Semaphore>,
    operation_id: String,
    actor: String,
}

impl BatchDriver {
    async fn run(self, request: BatchOperationRequest) {
        let started = Instant::now();
        if let Some(mut entry) = self.results.get_mut(&self.operation_id) {
            entry.status = BatchStatus::Running;
        }

        let kind = request.operation;
        let target_format = request.target_format;
        let progress = BatchProgress::new(
            &self.operation_id,
            request.files.len(),
            self.service.config().progress_interval,
        );

        let handles: Vec<_> = request
            .files
            .into_iter()
            .map(|file| {
                let file_name = file.file_name.clone();
                let service = self.service.clone();
                let permits = self.permits.clone();
                let actor = self.actor.clone();
                let progress = progress.clone();

                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    let file_started = Instant::now();
                    let file_name = file.file_name.clone();

                    let outcome = tokio::task::spawn_blocking(move || {
                        process_file(&service, kind, target_format, &file, &actor)
                    })
                    .await;

                    let result = outcome.unwrap_or_else(|e| {
                        let message = panic_message(e);
                        warn!("Processing of {} failed: {}", file_name, message);
                        FileResult::processing_error(file_name, &message, elapsed_ms(file_started))
                    });
                    progress.file_finished(result.success);
                    result
                });
                (file_name, handle)
            })
            .collect();

        let mut file_results = Vec::with_capacity(handles.len());
        for (file_name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => FileResult::processing_error(file_name, &panic_message(e), 0),
            };
            file_results.push(result);
        }
        progress.finish();

        self.complete(kind, file_results, started);
    }

    fn complete(self, kind: BatchOperationKind, file_results: Vec<FileResult>, started: Instant) {
        let success_count = file_results.iter().filter(|r| r.success).count();
        let failure_count = file_results.len() - success_count;
        let total_duration_ms = elapsed_ms(started);

        let history_type = kind.history_type();
        self.service.record(
            history_type,
            &format!("batch {}", self.operation_id),
            failure_count == 0,
            &format!(
                "{} files: {} succeeded, {} failed",
                file_results.len(),
                success_count,
                failure_count
            ),
            total_duration_ms,
            &self.actor,
        );
        for result in &file_results {
            self.service.record(
                history_type,
                &result.file_name,
                result.success,
                result.error.as_deref().unwrap_or("OK"),
                result.duration_ms,
                &self.actor,
            );
        }

        let accepted_at = self
            .results
            .get(&self.operation_id)
            .map(|entry| entry.accepted_at)
            .unwrap_or_else(Utc::now);

        info!(
            "Batch {} completed: {} succeeded, {} failed",
            self.operation_id, success_count, failure_count
        );
        self.results.insert(
            self.operation_id.clone(),
            BatchResult {
                operation_id: self.operation_id,
                operation_kind: kind,
                status: BatchStatus::Completed,
                total_files: file_results.len(),
                results: Some(file_results),
                success_count,
                failure_count,
                total_duration_ms,
                accepted_at,
                completed_at: Some(Utc::now()),
            },
        );
    }
}

fn process_file(
    service: &OscalService,
    kind: BatchOperationKind,
    target_format: Option<Format>,
    file: &BatchFile,
    actor: &str,
) -> FileResult {
    let started = Instant::now();
    debug!("Processing {} ({:?})", file.file_name, kind);

    match kind {
        BatchOperationKind::Validate => {
            let request = ValidationRequest {
                content: file.content.clone(),
                model_type: file.model_type,
                format: file.format,
                file_name: Some(file.file_name.clone()),
                include_rules: false,
            };
            let result = service.validate(&request, actor);
            FileResult {
                file_name: file.file_name.clone(),
                success: result.valid,
                error: result.first_error().map(str::to_string),
                duration_ms: elapsed_ms(started),
                output: None,
            }
        }
        BatchOperationKind::Convert => {
            let request = ConversionRequest {
                content: file.content.clone(),
                model_type: file.model_type,
                from_format: file.format,
                to_format: target_format,
                file_name: Some(file.file_name.clone()),
            };
            let result = service.convert(&request, actor);
            FileResult {
                file_name: file.file_name.clone(),
                success: result.success,
                error: result.error,
                duration_ms: elapsed_ms(started),
                output: result.content,
            }
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
