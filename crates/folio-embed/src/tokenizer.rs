//! Token counting over a fixed `tokenizer.json` encoding.

use std::path::Path;

use tokenizers::Tokenizer;
use tracing::info;

use folio_core::{FolioError, Result, TokenCounter};

/// Token counter backed by a HuggingFace `tokenizers` encoding.
///
/// Truncation and padding are disabled and special tokens are not added,
/// so counts reflect the raw text and are close to additive when texts are
/// joined with a space.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
    name: String,
}

impl HfTokenCounter {
    /// Load an encoding from a local `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading tokenizer from {:?}", path);

        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| FolioError::tokenizer(format!("Failed to load {}: {}", path.display(), e)))?;
        Self::with_tokenizer(tokenizer, path.display().to_string())
    }

    /// Load an encoding published on the HuggingFace hub (e.g. `Xenova/gpt-4`).
    pub fn from_pretrained(identifier: &str) -> Result<Self> {
        info!("Fetching tokenizer {}", identifier);

        let tokenizer = Tokenizer::from_pretrained(identifier, None)
            .map_err(|e| FolioError::tokenizer(format!("Failed to fetch {}: {}", identifier, e)))?;
        Self::with_tokenizer(tokenizer, identifier.to_string())
    }

    /// Resolve an encoding identifier: an existing path is read from disk,
    /// anything else is treated as a hub id.
    pub fn load(encoding: &str) -> Result<Self> {
        if Path::new(encoding).exists() {
            Self::from_file(encoding)
        } else {
            Self::from_pretrained(encoding)
        }
    }

    fn with_tokenizer(mut tokenizer: Tokenizer, name: String) -> Result<Self> {
        tokenizer
            .with_truncation(None)
            .map_err(|e| FolioError::tokenizer(format!("Failed to disable truncation: {}", e)))?;
        tokenizer.with_padding(None);

        Ok(Self { tokenizer, name })
    }

    fn encode(&self, text: &str) -> Result<tokenizers::Encoding> {
        self.tokenizer
            .encode(text, false)
            .map_err(|e| FolioError::tokenizer(format!("Tokenization failed: {}", e)))
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.get_ids().len())
    }

    /// Slices `text` at token offsets rather than decoding ids, so the result
    /// is always a suffix of `text` and never starts inside a character.
    fn tail(&self, text: &str, n: usize) -> Result<String> {
        let encoding = self.encode(text)?;
        let offsets = encoding.get_offsets();
        if n == 0 || offsets.is_empty() {
            return Ok(String::new());
        }

        // A cut can land inside a word or a multi-token character and
        // re-encode to more tokens than it was cut from; shrink until it fits.
        let mut start = offsets.len().saturating_sub(n);
        while start < offsets.len() {
            if let Some(tail) = text.get(offsets[start].0..) {
                let tail = tail.trim_start();
                if tail.is_empty() || self.count(tail)? <= n {
                    return Ok(tail.to_string());
                }
            }
            start += 1;
        }

        Ok(String::new())
    }

    fn encoding(&self) -> &str {
        &self.name
    }
}
