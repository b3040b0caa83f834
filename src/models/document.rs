use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One page of extracted PDF text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based page number.
    pub index: usize,
    pub text: String,
}

/// Text extracted from one source file, page by page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
    pub file_name: String,
    pub pages: Vec<Page>,
}

/// A bounded slice of one page, ready to embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub file_name: String,
    pub page: usize,
    /// Position of the chunk within its document.
    pub chunk_index: u32,
    /// Character offset of the chunk within its page.
    pub start_offset: usize,
    /// Leading characters shared with the previous chunk of the same page.
    pub overlap: usize,
    pub content: String,
}

/// An ordered slice of one document's chunks; the unit of retry and reporting.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub chunks: Vec<Chunk>,
}

/// A chunk paired with its embedding.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl Document {
    pub fn generate_id(path: &Path) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(path.to_string_lossy().as_bytes());
        hex::encode(&hash[..16])
    }

    pub fn new(path: impl Into<PathBuf>, pages: Vec<Page>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            id: Self::generate_id(&path),
            path,
            file_name,
            pages,
        }
    }

    /// Build a document from page texts in order.
    pub fn from_page_texts<I, S>(path: impl Into<PathBuf>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Page {
                index,
                text: text.into(),
            })
            .collect();
        Self::new(path, pages)
    }
}

impl Chunk {
    pub fn generate_id(document_id: &str, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Content without the characters shared with the previous chunk.
    pub fn fresh_content(&self) -> &str {
        match self.content.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.content[byte..],
            None => "",
        }
    }
}

impl Batch {
    /// Partition chunks into consecutive batches of at most `batch_size`, keeping order.
    pub fn partition(chunks: Vec<Chunk>, batch_size: usize) -> Vec<Batch> {
        let batch_size = batch_size.max(1);
        let mut batches = Vec::with_capacity(chunks.len().div_ceil(batch_size));
        let mut iter = chunks.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(Batch {
                index: batches.len(),
                chunks: iter.by_ref().take(batch_size).collect(),
            });
        }
        batches
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.content.clone()).collect()
    }
}
