//! Text splitting with overlap for embedding.

use crate::error::ConfigError;
use crate::models::{Chunk, Document, IngestionConfig};

/// Splits document pages into overlapping chunks of bounded size.
///
/// Sizes are counted in characters. Each chunk ends on the strongest boundary found in the
/// second half of the window (paragraph, line, sentence, word) or at a hard cut, and the next
/// chunk starts `chunk_overlap` characters earlier, nudged forward to a word start when the
/// overlap would begin mid-word.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

/// A chunk's position within its page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    start: usize,
    overlap: usize,
    content: String,
}

impl ChunkSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &IngestionConfig) -> Result<Self, ConfigError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split every non-blank page of `document`, numbering chunks across the document.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let source = document.path.to_string_lossy().to_string();
        let mut chunks = Vec::new();

        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }

            for span in self.split_text(&page.text) {
                let chunk_index = chunks.len() as u32;
                chunks.push(Chunk {
                    id: Chunk::generate_id(&document.id, chunk_index),
                    document_id: document.id.clone(),
                    source: source.clone(),
                    file_name: document.file_name.clone(),
                    page: page.index,
                    chunk_index,
                    start_offset: span.start,
                    overlap: span.overlap,
                    content: span.content,
                });
            }
        }

        chunks
    }

    fn split_text(&self, text: &str) -> Vec<Span> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut spans = Vec::new();

        let mut start = 0;
        let mut overlap = 0;

        while start < total {
            if total - start <= self.chunk_size {
                spans.push(Span {
                    start,
                    overlap,
                    content: chars[start..].iter().collect(),
                });
                break;
            }

            let end = self.find_break_point(&chars, start);
            spans.push(Span {
                start,
                overlap,
                content: chars[start..end].iter().collect(),
            });

            let next = self.next_start(&chars, end);
            overlap = end - next;
            start = next;
        }

        spans
    }

    /// Pick the end of the chunk starting at `start`. Always in `(start + overlap, start + size]`.
    fn find_break_point(&self, chars: &[char], start: usize) -> usize {
        let target_end = start + self.chunk_size;
        let search_start = (target_end - self.chunk_size / 2).max(start + self.chunk_overlap + 1);

        // Priority: double newline > single newline > sentence end > whitespace
        let mut paragraph = None;
        let mut newline = None;
        let mut sentence = None;
        let mut space = None;

        // `pos` is a candidate end; chars[pos - 1] is the chunk's last character.
        for pos in search_start..=target_end {
            match chars[pos - 1] {
                '\n' => {
                    if pos - 1 > start && chars[pos - 2] == '\n' {
                        paragraph = Some(pos);
                    }
                    newline = Some(pos);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos).is_some_and(|c| c.is_whitespace()) {
                        sentence = Some(pos);
                    }
                }
                c if c.is_whitespace() => space = Some(pos),
                _ => {}
            }
        }

        paragraph
            .or(newline)
            .or(sentence)
            .or(space)
            .unwrap_or(target_end)
    }

    /// Start of the chunk after one ending at `end`.
    fn next_start(&self, chars: &[char], end: usize) -> usize {
        let ideal = end - self.chunk_overlap;
        if ideal == 0 || chars[ideal - 1].is_whitespace() {
            return ideal;
        }
        // Mid-word: move to the next word start inside the overlap, if there is one.
        (ideal + 1..end)
            .find(|&p| chars[p - 1].is_whitespace())
            .unwrap_or(ideal)
    }
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(pages: &[&str]) -> Document {
        Document::from_page_texts("/manuals/furnace.pdf", pages.iter().copied())
    }

    fn reconstruct<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> String {
        chunks.into_iter().map(Chunk::fresh_content).collect()
    }

    #[test]
    fn test_small_document_single_chunk() {
        let splitter = ChunkSplitter::default();
        let chunks = splitter.split(&doc(&["Turn off the breaker first."]));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Turn off the breaker first.");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].overlap, 0);
        assert_eq!(chunks[0].file_name, "furnace.pdf");
    }

    #[test]
    fn test_empty_and_blank_pages_produce_nothing() {
        let splitter = ChunkSplitter::default();
        assert!(splitter.split(&doc(&[])).is_empty());
        assert!(splitter.split(&doc(&["", "   \n\n  "])).is_empty());
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(ChunkSplitter::new(0, 0).is_err());
        assert!(ChunkSplitter::new(100, 100).is_err());
        assert!(ChunkSplitter::new(100, 150).is_err());
        assert!(ChunkSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn test_hard_cut_overlap_is_exact() {
        let splitter = ChunkSplitter::new(10, 3).unwrap();
        let chunks = splitter.split(&doc(&["abcdefghijklmnopqrstuvwxyz"]));

        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[1].content, "hijklmnopq");
        assert_eq!(chunks[1].overlap, 3);
        assert_eq!(chunks.last().unwrap().content.chars().last(), Some('z'));
        assert_eq!(reconstruct(&chunks), "abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let splitter = ChunkSplitter::new(40, 5).unwrap();
        let text = "Check the pilot light now.\n\nThen relight it. Wait a bit longer please.";
        let chunks = splitter.split(&doc(&[text]));

        assert!(chunks[0].content.ends_with("\n\n"));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let splitter = ChunkSplitter::new(30, 4).unwrap();
        let text = "Drain the tank fully. Flush it with cold water until clear";
        let chunks = splitter.split(&doc(&[text]));

        assert_eq!(chunks[0].content, "Drain the tank fully.");
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_overlap_snaps_to_word_start() {
        let splitter = ChunkSplitter::new(20, 8).unwrap();
        let text = "replace the filter every three months";
        let chunks = splitter.split(&doc(&[text]));

        for chunk in &chunks[1..] {
            assert!(chunk.overlap <= 8);
            let first = chunk.content.chars().next().unwrap();
            assert!(!first.is_whitespace());
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_chunks_numbered_across_pages() {
        let splitter = ChunkSplitter::new(20, 5).unwrap();
        let chunks = splitter.split(&doc(&[
            "Page one has some words in it.",
            "",
            "Page three also has words in it.",
        ]));

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
        let first_of_page_three = chunks.iter().find(|c| c.page == 2).unwrap();
        assert_eq!(first_of_page_three.overlap, 0);
        assert_eq!(first_of_page_three.start_offset, 0);
        assert!(chunks.iter().all(|c| c.page != 1));
    }

    #[test]
    fn test_multibyte_text() {
        let splitter = ChunkSplitter::new(12, 4).unwrap();
        let text = "Température élevée, vérifiez le thermostat ✓ maintenant";
        let chunks = splitter.split(&doc(&[text]));

        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 12);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_deterministic() {
        let splitter = ChunkSplitter::new(50, 10).unwrap();
        let text = "Gutters. ".repeat(40);
        let d = doc(&[text.as_str()]);
        assert_eq!(splitter.split(&d), splitter.split(&d));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn chunks_reconstruct_document(
            pages in proptest::collection::vec("[a-zA-Z .!?\n]{0,600}", 0..4),
            chunk_size in 2usize..200,
            ratio in 0.0f64..0.95,
        ) {
            let overlap = ((chunk_size as f64) * ratio) as usize;
            let overlap = overlap.min(chunk_size - 1);
            let splitter = ChunkSplitter::new(chunk_size, overlap).unwrap();
            let d = Document::from_page_texts("/p.pdf", pages);
            let chunks = splitter.split(&d);

            for page in &d.pages {
                let on_page: Vec<&Chunk> = chunks.iter().filter(|c| c.page == page.index).collect();
                if page.text.trim().is_empty() {
                    prop_assert!(on_page.is_empty());
                } else {
                    prop_assert_eq!(reconstruct(on_page), page.text.clone());
                }
            }
        }

        #[test]
        fn chunks_bounded_and_non_empty(
            content in "\\PC{1,2000}",
            chunk_size in 1usize..300,
            ratio in 0.0f64..0.95,
        ) {
            let overlap = (((chunk_size as f64) * ratio) as usize).min(chunk_size - 1);
            let splitter = ChunkSplitter::new(chunk_size, overlap).unwrap();
            let chunks = splitter.split(&doc(&[content.as_str()]));

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert!(!chunk.content.is_empty());
                prop_assert!(chunk.content.chars().count() <= chunk_size);
                prop_assert!(chunk.overlap <= overlap);
                prop_assert_eq!(chunk.chunk_index, i as u32);
            }
        }

        #[test]
        fn overlap_exact_without_boundaries(
            content in "[a-z]{1,1500}",
            chunk_size in 2usize..200,
            ratio in 0.0f64..0.95,
        ) {
            let overlap = (((chunk_size as f64) * ratio) as usize).min(chunk_size - 1);
            let splitter = ChunkSplitter::new(chunk_size, overlap).unwrap();
            let chunks = splitter.split(&doc(&[content.as_str()]));

            for chunk in chunks.iter().skip(1) {
                prop_assert_eq!(chunk.overlap, overlap);
            }
        }
    }
}
