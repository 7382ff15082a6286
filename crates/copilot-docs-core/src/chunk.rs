//! Line-boundary, token-bounded page chunker.
//!
//! Splits extracted page text into [`DocChunk`]s whose encoded length,
//! measured by the configured [`TokenCounter`], stays within
//! `max_tokens`. Each chunk receives a deterministic id derived from its
//! source name, page index, and chunk number, so re-ingesting unchanged
//! input reproduces identical ids.
//!
//! # Algorithm
//!
//! 1. Split the page on whitespace runs that contain a newline; trim
//!    each piece and drop empty ones. The pieces ("sentences") keep
//!    their original order.
//! 2. Tentatively append each sentence to the running buffer (joined by
//!    `\n`) and re-measure the whole buffer.
//! 3. If the buffer still fits, keep it. Otherwise flush the previous
//!    buffer as a chunk, start a new buffer with just this sentence, and
//!    advance the chunk number.
//! 4. Flush the trailing buffer.
//!
//! A single sentence longer than `max_tokens` is never split further: it
//! becomes its own oversized chunk. Pages with no text yield no chunks.
//!
//! # Example
//!
//! ```rust
//! use copilot_docs_core::chunk::Chunker;
//! use copilot_docs_core::tokenize::WhitespaceTokenCounter;
//!
//! let counter = WhitespaceTokenCounter;
//! let chunker = Chunker::new(&counter, 256);
//! let chunks = chunker.chunk_page("Hello world.\nSecond line.", 0, "demo-readme").unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "Hello world.\nSecond line.");
//! assert_eq!(chunks[0].metadata.page_number, 1);
//! ```

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::models::{ChunkMetadata, DocChunk};
use crate::tokenize::TokenCounter;

/// Width of a chunk id in hex characters.
pub const CHUNK_ID_LEN: usize = 12;

/// Default maximum chunk size in tokens.
pub const DEFAULT_MAX_CHUNK_TOKENS: usize = 256;

/// Split page text into trimmed, non-empty line groups.
///
/// Equivalent to splitting on `\s*\n\s*` and discarding empty pieces.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Deterministic chunk id: SHA-256 of `"{source}-{page_index}-{chunk_number}"`,
/// truncated to [`CHUNK_ID_LEN`] hex characters.
///
/// `page_index` is the 0-based page position, not the 1-based page
/// number stored in metadata.
pub fn chunk_id(source: &str, page_index: usize, chunk_number: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}-{}", source, page_index, chunk_number).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..CHUNK_ID_LEN].to_string()
}

/// Greedy chunker bound to a tokenizer and a size limit.
pub struct Chunker<'a> {
    counter: &'a dyn TokenCounter,
    max_tokens: usize,
}

impl<'a> Chunker<'a> {
    pub fn new(counter: &'a dyn TokenCounter, max_tokens: usize) -> Self {
        Self {
            counter,
            max_tokens,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Chunk a single page. `page_index` is 0-based.
    ///
    /// An oversized first sentence becomes chunk 0 on its own. No empty
    /// chunk is emitted ahead of it, so its numbering (and id) starts at 0.
    pub fn chunk_page(&self, text: &str, page_index: usize, source: &str) -> Result<Vec<DocChunk>> {
        let mut chunks = Vec::new();
        let mut buf = String::new();
        let mut chunk_number = 0usize;

        for sentence in split_sentences(text) {
            let candidate = if buf.is_empty() {
                sentence.to_string()
            } else {
                format!("{}\n{}", buf, sentence)
            };

            if self.counter.count_tokens(&candidate)? <= self.max_tokens {
                buf = candidate;
                continue;
            }

            if buf.is_empty() {
                // Oversized first sentence: it stands alone.
                buf = candidate;
                continue;
            }

            chunks.push(make_chunk(&buf, chunk_number, page_index, source));
            chunk_number += 1;
            buf = sentence.to_string();
        }

        if !buf.is_empty() {
            chunks.push(make_chunk(&buf, chunk_number, page_index, source));
        }

        Ok(chunks)
    }

    /// Chunk every page of a document, in page order.
    pub fn chunk_pages<S: AsRef<str>>(&self, pages: &[S], source: &str) -> Result<Vec<DocChunk>> {
        let mut all = Vec::new();
        for (page_index, page) in pages.iter().enumerate() {
            all.extend(self.chunk_page(page.as_ref(), page_index, source)?);
        }
        Ok(all)
    }
}

fn make_chunk(text: &str, chunk_number: usize, page_index: usize, source: &str) -> DocChunk {
    DocChunk {
        id: chunk_id(source, page_index, chunk_number),
        text: text.to_string(),
        metadata: ChunkMetadata {
            source: source.to_string(),
            page_number: (page_index + 1) as u32,
            chunk_number: chunk_number as u32,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::WhitespaceTokenCounter;

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_split_sentences() {
        let text = "  first line  \n\n   \n second\tline\n\t\nthird ";
        assert_eq!(
            split_sentences(text),
            vec!["first line", "second\tline", "third"]
        );
    }

    #[test]
    fn test_split_keeps_inline_whitespace() {
        assert_eq!(split_sentences("a  b c"), vec!["a  b c"]);
    }

    #[test]
    fn test_empty_page_no_chunks() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 10);
        assert!(chunker.chunk_page("", 0, "src").unwrap().is_empty());
        assert!(chunker.chunk_page(" \n\n \t\n", 3, "src").unwrap().is_empty());
    }

    #[test]
    fn test_lines_joined_with_newline() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 10);
        let chunks = chunker.chunk_page("alpha beta\n\n\ngamma", 0, "src").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "alpha beta\ngamma");
        assert_eq!(chunks[0].metadata.chunk_number, 0);
    }

    #[test]
    fn test_two_paragraphs_over_limit_split() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 256);
        let text = format!("{}\n\n{}", words("a", 150), words("b", 150));
        let chunks = chunker.chunk_page(&text, 4, "proj-docs").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.chunk_number, 0);
        assert_eq!(chunks[1].metadata.chunk_number, 1);
        assert_eq!(chunks[0].metadata.page_number, 5);
        assert_eq!(chunks[0].text, words("a", 150));
        assert_eq!(chunks[1].text, words("b", 150));
    }

    #[test]
    fn test_chunks_respect_limit() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 12);
        let text = (0..40)
            .map(|i| words(&format!("l{}w", i), 1 + i % 5))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunker.chunk_page(&text, 0, "src").unwrap();
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert!(counter.count_tokens(&c.text).unwrap() <= 12);
            assert_eq!(c.metadata.chunk_number, i as u32);
        }
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 5);
        let long = words("x", 9);
        let text = format!("{}\nshort one\n{}", long, words("y", 4));
        let chunks = chunker.chunk_page(&text, 0, "src").unwrap();
        assert_eq!(chunks[0].text, long);
        assert_eq!(chunks[0].metadata.chunk_number, 0);
        assert_eq!(chunks[0].id, chunk_id("src", 0, 0));
        assert_eq!(chunks[1].id, chunk_id("src", 0, 1));
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
        assert_eq!(chunks[1].text, "short one");
        assert_eq!(chunks[2].text, words("y", 4));
    }

    #[test]
    fn test_oversized_sentence_mid_page() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 5);
        let text = format!("small\n{}\ntail", words("z", 8));
        let chunks = chunker.chunk_page(&text, 0, "src").unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["small".to_string(), words("z", 8), "tail".to_string()]);
    }

    #[test]
    fn test_chunk_id_deterministic_and_fixed_width() {
        let a = chunk_id("uniswap-docs", 2, 7);
        let b = chunk_id("uniswap-docs", 2, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), CHUNK_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, chunk_id("uniswap-docs", 2, 8));
        assert_ne!(a, chunk_id("uniswap-docs", 3, 7));
        assert_ne!(a, chunk_id("polygon-docs", 2, 7));
    }

    #[test]
    fn test_rechunking_is_reproducible() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 4);
        let pages = vec!["one two\nthree four five\nsix", "", "seven\neight nine"];
        let c1 = chunker.chunk_pages(&pages, "topic-file").unwrap();
        let c2 = chunker.chunk_pages(&pages, "topic-file").unwrap();
        assert_eq!(c1, c2);
        assert_eq!(c1.last().unwrap().metadata.page_number, 3);
        assert_eq!(c1[0].id, chunk_id("topic-file", 0, 0));
    }

    #[test]
    fn test_chunk_numbers_restart_per_page() {
        let counter = WhitespaceTokenCounter;
        let chunker = Chunker::new(&counter, 2);
        let pages = vec!["a b\nc d", "e f\ng h"];
        let chunks = chunker.chunk_pages(&pages, "s").unwrap();
        let numbers: Vec<(u32, u32)> = chunks
            .iter()
            .map(|c| (c.metadata.page_number, c.metadata.chunk_number))
            .collect();
        assert_eq!(numbers, vec![(1, 0), (1, 1), (2, 0), (2, 1)]);
    }
}
