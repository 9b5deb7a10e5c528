//! ONNX Runtime sentence embedder.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use folio_core::{Embedder, EmbeddingConfig, FolioError, Result};

/// Longest input the sentence-transformers export was trained on.
const MAX_SEQUENCE_LENGTH: usize = 384;

/// Sentence embedder for `all-mpnet-base-v2` style exports.
///
/// The model directory must contain `model.onnx` and `tokenizer.json`.
/// Documents and queries share one representation: no instruction
/// prefixes, attention-masked mean pooling, unit length output.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Load the model described by `config`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::load(
            &config.model_path,
            config.dimension,
            config.batch_size,
            config.num_threads,
        )
    }

    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn load(
        model_dir: impl AsRef<Path>,
        dimension: usize,
        batch_size: usize,
        num_threads: usize,
    ) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        require_file(&model_path)?;
        require_file(&tokenizer_path)?;

        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| FolioError::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| FolioError::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(num_threads.max(1))
            .map_err(|e| FolioError::embedding(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| FolioError::embedding(format!("Failed to load model: {}", e)))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| FolioError::embedding(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| FolioError::embedding(format!("Failed to configure truncation: {}", e)))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        info!("Embedder initialized: dim={}, batch_size={}", dimension, batch_size);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension,
            batch_size: batch_size.max(1),
        })
    }

    fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch)?);
        }
        Ok(vectors)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Padding is batch-longest, so every encoding has the same length.
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| FolioError::embedding(format!("Tokenization failed: {}", e)))?;

        let rows = encodings.len();
        let cols = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
        debug!("Embedding batch: rows={}, cols={}", rows, cols);

        let mut input_ids = Vec::with_capacity(rows * cols);
        let mut attention_mask = Vec::with_capacity(rows * cols);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let input_ids = Tensor::from_array((vec![rows, cols], input_ids))
            .map_err(|e| FolioError::embedding(format!("Failed to create input tensor: {}", e)))?;
        let attention_mask = Tensor::from_array((vec![rows, cols], attention_mask))
            .map_err(|e| FolioError::embedding(format!("Failed to create mask tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| FolioError::embedding(format!("Failed to lock session: {}", e)))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            ])
            .map_err(|e| FolioError::embedding(format!("Inference failed: {}", e)))?;

        let (_, hidden) = outputs
            .iter()
            .next()
            .ok_or_else(|| FolioError::embedding("No output tensor found"))?;
        let hidden = hidden
            .try_extract_array::<f32>()
            .map_err(|e| FolioError::embedding(format!("Failed to extract tensor: {}", e)))?;

        let vectors = match hidden.ndim() {
            3 => mean_pool(&hidden, &encodings),
            2 => hidden
                .outer_iter()
                .map(|row| l2_normalize(row.iter().copied().collect()))
                .collect(),
            _ => {
                return Err(FolioError::embedding(format!(
                    "Unexpected output shape: {:?}",
                    hidden.shape()
                )))
            }
        };

        if let Some(v) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(FolioError::embedding(format!(
                "Model produced {} dimensions, expected {}",
                v.len(),
                self.dimension
            )));
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.embed_all(texts)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::embedding("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(FolioError::embedding(format!("Model file not found: {}", path.display())))
    }
}

/// Average token states over `[batch, seq, hidden]`, skipping padding.
fn mean_pool(hidden: &ArrayViewD<'_, f32>, encodings: &[Encoding]) -> Vec<Vec<f32>> {
    let shape = hidden.shape();
    let (seq_len, width) = (shape[1], shape[2]);

    encodings
        .iter()
        .enumerate()
        .map(|(row, encoding)| {
            let mut sum = vec![0.0f32; width];
            let mut used = 0usize;
            for (pos, &mask) in encoding.get_attention_mask().iter().take(seq_len).enumerate() {
                if mask == 0 {
                    continue;
                }
                used += 1;
                for (k, acc) in sum.iter_mut().enumerate() {
                    *acc += hidden[[row, pos, k]];
                }
            }
            if used > 0 {
                for acc in &mut sum {
                    *acc /= used as f32;
                }
            }
            l2_normalize(sum)
        })
        .collect()
}

pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_model_dir() {
        let err = OnnxEmbedder::load("/nonexistent/model", 768, 32, 1).err().unwrap();
        assert_eq!(err.error_code(), "EMBEDDING_ERROR");
        assert!(err.to_string().contains("model.onnx"));
    }
}
