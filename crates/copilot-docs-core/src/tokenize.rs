//! Token counting abstraction.
//!
//! Both the chunker and the context assembler only ever need the length
//! of an encoded sequence, never the token ids themselves.

use anyhow::Result;

/// A tokenizer reduced to the one thing the pipeline uses: a count.
///
/// Implementations are shared read-only across concurrent requests.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Counts whitespace-separated words. No vocabulary, no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }
}
