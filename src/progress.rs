//! Progress tracking for batch operations.

use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counts finished files of one batch, shared across its worker tasks.
#[derive(Clone)]
pub struct BatchProgress {
    operation_id: Arc<str>,
    files_finished: Arc<AtomicUsize>,
    files_failed: Arc<AtomicUsize>,
    total_files: usize,
    start_time: Instant,
    report_interval: usize,
}

impl BatchProgress {
    /// Create a tracker that logs every `report_interval` finished files.
    pub fn new(operation_id: &str, total_files: usize, report_interval: usize) -> Self {
        Self {
            operation_id: Arc::from(operation_id),
            files_finished: Arc::new(AtomicUsize::new(0)),
            files_failed: Arc::new(AtomicUsize::new(0)),
            total_files,
            start_time: Instant::now(),
            report_interval: report_interval.max(1),
        }
    }

    /// Count one finished file and log progress if the interval is reached.
    pub fn file_finished(&self, success: bool) {
        if !success {
            self.files_failed.fetch_add(1, Ordering::Relaxed);
        }
        let count = self.files_finished.fetch_add(1, Ordering::Relaxed) + 1;

        if count % self.report_interval == 0 && count < self.total_files {
            let elapsed = self.start_time.elapsed();
            info!(
                "Batch {}: {}/{} files processed ({:.0} files/sec, elapsed: {:.1}s)",
                self.operation_id,
                count,
                self.total_files,
                count as f64 / elapsed.as_secs_f64(),
                elapsed.as_secs_f64()
            );
        }
    }

    /// Log final statistics.
    pub fn finish(&self) {
        info!(
            "Batch {} complete: {} files, {} failed in {:.2}s",
            self.operation_id,
            self.finished_count(),
            self.failed_count(),
            self.start_time.elapsed().as_secs_f64()
        );
    }

    pub fn finished_count(&self) -> usize {
        self.files_finished.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> usize {
        self.files_failed.load(Ordering::Relaxed)
    }
}
