//! Outcome of an ingestion run.

use std::path::PathBuf;

use serde::Serialize;

/// Result of storing one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub index: usize,
    pub size: usize,
    pub embed_attempts: u32,
    pub upsert_attempts: u32,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What happened to one PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Every batch was stored.
    Succeeded,
    /// Some batches were stored and some failed or were never attempted.
    Partial,
    /// Nothing from this file was stored.
    Failed { reason: String },
    /// The file had no extractable text.
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_name: String,
    pub path: PathBuf,
    pub outcome: FileOutcome,
    pub pages: usize,
    pub chunks: usize,
    pub batches_total: usize,
    pub batches: Vec<BatchResult>,
}

impl FileReport {
    pub fn new(file_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            path: path.into(),
            outcome: FileOutcome::Succeeded,
            pages: 0,
            chunks: 0,
            batches_total: 0,
            batches: Vec::new(),
        }
    }

    pub fn batches_succeeded(&self) -> usize {
        self.batches.iter().filter(|b| b.succeeded).count()
    }

    pub fn batches_failed(&self) -> usize {
        self.batches.iter().filter(|b| !b.succeeded).count()
    }

    pub fn chunks_stored(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.succeeded)
            .map(|b| b.size)
            .sum()
    }

    /// Derive the outcome from the recorded batches.
    pub fn settle(&mut self) {
        if matches!(
            self.outcome,
            FileOutcome::Failed { .. } | FileOutcome::Skipped { .. }
        ) {
            return;
        }
        let stored = self.batches_succeeded();
        self.outcome = if stored == self.batches_total {
            FileOutcome::Succeeded
        } else if stored == 0 {
            let reason = self
                .batches
                .iter()
                .find_map(|b| b.error.clone())
                .unwrap_or_else(|| "no batch was stored".to_string());
            FileOutcome::Failed { reason }
        } else {
            FileOutcome::Partial
        };
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub collection: String,
    pub files: Vec<FileReport>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl IngestionReport {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            files: Vec::new(),
            cancelled: false,
            duration_ms: 0,
        }
    }

    pub fn files_processed(&self) -> usize {
        self.files.len()
    }

    pub fn files_succeeded(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Succeeded))
    }

    pub fn files_partial(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Partial))
    }

    pub fn files_failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    pub fn files_skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn batches_succeeded(&self) -> usize {
        self.files.iter().map(FileReport::batches_succeeded).sum()
    }

    pub fn batches_failed(&self) -> usize {
        self.files.iter().map(FileReport::batches_failed).sum()
    }

    pub fn chunks_stored(&self) -> usize {
        self.files.iter().map(FileReport::chunks_stored).sum()
    }

    /// True when the run finished and nothing failed.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.files_failed() == 0 && self.files_partial() == 0
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}
