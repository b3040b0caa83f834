//! PDF text extraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::ExtractionError;
use crate::models::Document;

/// Turns a file on disk into a paged [`Document`].
#[async_trait]
pub trait PdfExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<Document, ExtractionError>;
}

/// Extractor backed by `pdf-extract`, run on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor;

#[async_trait]
impl PdfExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<Document, ExtractionError> {
        let path = tokio::fs::canonicalize(path).await?;
        let meta = tokio::fs::metadata(&path).await?;
        if !meta.is_file() {
            return Err(ExtractionError::Parse(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let path_buf: PathBuf = path.clone();
        // pdf-extract can panic on malformed input; the join error turns that into a parse error.
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_by_pages(&path_buf)
                .map_err(|e| ExtractionError::Parse(e.to_string()))
        })
        .await
        .map_err(|e| ExtractionError::Parse(format!("extractor aborted: {e}")))??;

        debug!(path = %path.display(), pages = pages.len(), "extracted PDF text");
        Ok(Document::from_page_texts(path, pages))
    }
}
