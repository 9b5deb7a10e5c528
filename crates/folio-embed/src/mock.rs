//! Deterministic embedder for tests and offline runs.

use async_trait::async_trait;

use folio_core::{Embedder, FolioError, Result};

use crate::onnx::l2_normalize;

/// Bag-of-words embedder using feature hashing.
///
/// Each lowercase alphanumeric word adds weight to one hashed dimension, so
/// texts sharing vocabulary land close together under cosine similarity.
/// No model files are needed.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
    fail: bool,
}

impl MockEmbedder {
    /// Create a mock embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            fail: false,
        }
    }

    /// A mock whose every call fails with an embedding error.
    pub fn failing() -> Self {
        Self {
            dimension: 8,
            fail: true,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = fnv1a(&word.to_lowercase());
            v[(hash % self.dimension as u64) as usize] += 1.0;
        }
        l2_normalize(v)
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            Err(FolioError::embedding("mock embedder configured to fail"))
        } else {
            Ok(())
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(768)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.check()?;
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.check()?;
        Ok(self.embed_one(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
