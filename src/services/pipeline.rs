//! Folder-to-collection ingestion: extract, split, embed, upsert.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::embedding::Embedder;
use super::extractor::PdfExtractor;
use super::splitter::ChunkSplitter;
use super::vector_store::VectorStore;
use crate::error::{BatchError, EmbeddingError, IngestError};
use crate::models::{
    Batch, BatchResult, FileOutcome, FileReport, IngestionReport, Metric, VectorPoint,
};
use crate::utils::file::list_pdf_files;
use crate::utils::retry::RetryPolicy;

/// Progress notifications for a presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// Emitted once the folder listing is known.
    RunStarted { collection: String, files: usize },
    FileStarted {
        file_name: String,
        position: usize,
        total: usize,
    },
    FileSkipped { file_name: String, reason: String },
    ExtractionFailed { file_name: String, error: String },
    Chunked {
        file_name: String,
        chunks: usize,
        batches: usize,
    },
    Retrying {
        file_name: String,
        batch: usize,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    BatchStored {
        file_name: String,
        batch: usize,
        size: usize,
    },
    BatchFailed {
        file_name: String,
        batch: usize,
        error: String,
    },
    FileFinished {
        file_name: String,
        outcome: FileOutcome,
    },
}

/// Drives one ingestion run over injected collaborators.
pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn PdfExtractor>,
    splitter: ChunkSplitter,
    retry: RetryPolicy,
    batch_size: usize,
    dimension: u64,
    metric: Metric,
    cancel: CancellationToken,
    progress: Option<UnboundedSender<IngestEvent>>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn PdfExtractor>,
    ) -> Self {
        let dimension = embedder.dimension();
        let cancel = CancellationToken::new();
        Self {
            store,
            embedder,
            extractor,
            splitter: ChunkSplitter::default(),
            retry: RetryPolicy::default().with_cancellation(cancel.clone()),
            batch_size: 100,
            dimension,
            metric: Metric::default(),
            cancel,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_splitter(mut self, splitter: ChunkSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry.with_cancellation(self.cancel.clone());
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Dimension and metric the target collection must have.
    #[must_use]
    pub fn with_collection_schema(mut self, dimension: u64, metric: Metric) -> Self {
        self.dimension = dimension;
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.retry = self.retry.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: UnboundedSender<IngestEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Ingest every PDF directly inside `folder` into `collection`.
    ///
    /// Only setup problems are errors. Per-file and per-batch failures are recorded in the
    /// report and the run moves on.
    pub async fn ingest(
        &self,
        folder: &Path,
        collection: &str,
    ) -> Result<IngestionReport, IngestError> {
        let started = Instant::now();

        let produced = self.embedder.dimension();
        if produced != self.dimension {
            return Err(IngestError::DimensionMismatch {
                embedder: produced,
                collection: self.dimension,
            });
        }

        let info = self
            .store
            .ensure_collection(collection, self.dimension, self.metric)
            .await?;
        if info.dimension != produced {
            return Err(IngestError::DimensionMismatch {
                embedder: produced,
                collection: info.dimension,
            });
        }

        let files = list_pdf_files(folder).map_err(|e| IngestError::Folder {
            path: folder.to_path_buf(),
            message: e.to_string(),
        })?;

        info!(
            collection,
            files = files.len(),
            model = self.embedder.model(),
            "starting ingestion"
        );
        self.emit(IngestEvent::RunStarted {
            collection: collection.to_string(),
            files: files.len(),
        });

        let mut report = IngestionReport::new(collection);
        for (position, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            let file_report = self.ingest_file(path, collection, position, files.len()).await;
            report.files.push(file_report);
        }

        let interrupted = report.files.len() < files.len()
            || report
                .files
                .iter()
                .any(|f| f.batches.len() < f.batches_total);
        report.cancelled = self.cancel.is_cancelled() && interrupted;
        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.cancelled {
            warn!(collection, "ingestion cancelled");
        }
        info!(
            collection,
            files = report.files_processed(),
            chunks = report.chunks_stored(),
            failed_batches = report.batches_failed(),
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_file(
        &self,
        path: &Path,
        collection: &str,
        position: usize,
        total: usize,
    ) -> FileReport {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let mut report = FileReport::new(&file_name, path);

        info!(file = %file_name, position = position + 1, total, "processing file");
        self.emit(IngestEvent::FileStarted {
            file_name: file_name.clone(),
            position,
            total,
        });

        let document = match self.extractor.extract(path).await {
            Ok(document) => document,
            Err(e) => {
                warn!(file = %file_name, error = %e, "extraction failed, skipping file");
                report.outcome = FileOutcome::Failed {
                    reason: e.to_string(),
                };
                self.emit(IngestEvent::ExtractionFailed {
                    file_name: file_name.clone(),
                    error: e.to_string(),
                });
                self.finish_file(&report);
                return report;
            }
        };

        report.pages = document.pages.len();
        let chunks = self.splitter.split(&document);
        report.chunks = chunks.len();

        if chunks.is_empty() {
            let reason = "no extractable text".to_string();
            info!(file = %file_name, "{reason}");
            report.outcome = FileOutcome::Skipped {
                reason: reason.clone(),
            };
            self.emit(IngestEvent::FileSkipped {
                file_name: file_name.clone(),
                reason,
            });
            self.finish_file(&report);
            return report;
        }

        let batches = Batch::partition(chunks, self.batch_size);
        report.batches_total = batches.len();
        debug!(file = %file_name, chunks = report.chunks, batches = batches.len(), "split document");
        self.emit(IngestEvent::Chunked {
            file_name: file_name.clone(),
            chunks: report.chunks,
            batches: batches.len(),
        });

        for batch in batches {
            if self.cancel.is_cancelled() {
                info!(file = %file_name, batch = batch.index, "cancelled before batch");
                break;
            }
            match self.store_batch(&file_name, collection, batch).await {
                Some(result) => report.batches.push(result),
                None => break,
            }
        }

        report.settle();
        self.finish_file(&report);
        report
    }

    /// Embed then upsert one batch, each step under its own retry loop.
    ///
    /// `None` when cancellation cut a backoff short; the batch is left unrecorded.
    async fn store_batch(
        &self,
        file_name: &str,
        collection: &str,
        batch: Batch,
    ) -> Option<BatchResult> {
        let index = batch.index;
        let size = batch.len();
        let texts = batch.texts();

        let notify = |attempt: u32, delay: Duration, error: &BatchError| {
            self.emit(IngestEvent::Retrying {
                file_name: file_name.to_string(),
                batch: index,
                attempt,
                delay,
                error: error.to_string(),
            });
        };

        let (embedded, embed_state) = self
            .retry
            .execute_notify(|| self.embed_checked(texts.clone()), notify)
            .await
            .into_parts();

        if embed_state.cancelled {
            info!(file = %file_name, batch = index, "cancelled while retrying embedding");
            return None;
        }
        let vectors = match embedded {
            Ok(vectors) => vectors,
            Err(e) => {
                return Some(self.batch_failed(file_name, index, size, embed_state.attempts, 0, e));
            }
        };

        let points: Vec<VectorPoint> = batch
            .chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint { chunk, vector })
            .collect();

        let (stored, upsert_state) = self
            .retry
            .execute_notify(
                || async {
                    self.store
                        .upsert_batch(collection, points.clone())
                        .await
                        .map_err(BatchError::from)
                },
                notify,
            )
            .await
            .into_parts();

        if upsert_state.cancelled {
            info!(file = %file_name, batch = index, "cancelled while retrying upsert");
            return None;
        }
        if let Err(e) = stored {
            return Some(self.batch_failed(
                file_name,
                index,
                size,
                embed_state.attempts,
                upsert_state.attempts,
                e,
            ));
        }

        debug!(file = %file_name, batch = index, size, "stored batch");
        self.emit(IngestEvent::BatchStored {
            file_name: file_name.to_string(),
            batch: index,
            size,
        });
        Some(BatchResult {
            index,
            size,
            embed_attempts: embed_state.attempts,
            upsert_attempts: upsert_state.attempts,
            succeeded: true,
            error: None,
        })
    }

    /// Embed and check that every vector fits the collection.
    async fn embed_checked(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, BatchError> {
        let expected = texts.len();
        let vectors = self.embedder.embed(texts).await?;

        if vectors.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {expected} embeddings, got {}",
                vectors.len()
            ))
            .into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() as u64 != self.dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len() as u64,
            }
            .into());
        }
        Ok(vectors)
    }

    fn batch_failed(
        &self,
        file_name: &str,
        index: usize,
        size: usize,
        embed_attempts: u32,
        upsert_attempts: u32,
        error: BatchError,
    ) -> BatchResult {
        warn!(file = %file_name, batch = index, error = %error, "batch failed");
        self.emit(IngestEvent::BatchFailed {
            file_name: file_name.to_string(),
            batch: index,
            error: error.to_string(),
        });
        BatchResult {
            index,
            size,
            embed_attempts,
            upsert_attempts,
            succeeded: false,
            error: Some(error.to_string()),
        }
    }

    fn finish_file(&self, report: &FileReport) {
        self.emit(IngestEvent::FileFinished {
            file_name: report.file_name.clone(),
            outcome: report.outcome.clone(),
        });
    }

    fn emit(&self, event: IngestEvent) {
        if let Some(ref tx) = self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}
