//! Word-level token counting.

use folio_core::{Result, TokenCounter};

/// Counts one token per whitespace-delimited word.
///
/// Exact and additive: joining two texts with a space adds their counts.
/// Used where no model tokenizer is available, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }

    fn tail(&self, text: &str, n: usize) -> Result<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let skip = words.len().saturating_sub(n);
        Ok(words[skip..].join(" "))
    }

    fn encoding(&self) -> &str {
        "whitespace"
    }
}
