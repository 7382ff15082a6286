//! Embedding backends.
//!
//! - **[`HashEmbedder`]**: deterministic feature hashing, no model files.
//!   Used in tests and air-gapped setups; similarity reflects shared
//!   words only.
//! - **`FastembedEmbedder`**: runs a sentence-embedding model locally via
//!   fastembed (feature `local-models`). The model is downloaded from
//!   Hugging Face on first use and cached.
//!
//! # Provider Selection
//!
//! | Config Value | Backend |
//! |-------------|---------|
//! | `"local"` | `FastembedEmbedder` |
//! | `"hash"` | [`HashEmbedder`] (requires `embedding.dims`) |

use std::sync::Arc;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use copilot_docs_core::embedding::{normalize_l2, Embedder};

use crate::config::EmbeddingConfig;

/// Feature-hashing embedder.
///
/// Each lowercase alphanumeric word adds `±1` to one of `dims` buckets
/// chosen by its SHA-256 digest; the vector is then L2-normalized.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            bail!("hash embedder needs dims > 0");
        }
        Ok(Self { dims })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let digest = Sha256::digest(word.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        normalize_l2(&mut v);
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(feature = "local-models")]
pub use local::FastembedEmbedder;

#[cfg(feature = "local-models")]
mod local {
    use std::sync::Mutex;

    use anyhow::{anyhow, bail, Result};
    use tracing::info;

    use copilot_docs_core::embedding::Embedder;

    use crate::config::EmbeddingConfig;

    /// Local sentence-embedding model via fastembed.
    ///
    /// fastembed needs `&mut` to run inference, so calls serialize on a
    /// mutex.
    pub struct FastembedEmbedder {
        model_name: String,
        dims: usize,
        batch_size: usize,
        model: Mutex<fastembed::TextEmbedding>,
    }

    impl FastembedEmbedder {
        /// Load (and on first use, download) the configured model.
        /// Blocking.
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let (fastembed_model, default_dims) = config_to_fastembed_model(&config.model)?;
            info!(model = %config.model, "loading embedding model");
            let model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
            .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;

            Ok(Self {
                model_name: config.model.clone(),
                dims: config.dims.unwrap_or(default_dims),
                batch_size: config.batch_size,
                model: Mutex::new(model),
            })
        }
    }

    impl Embedder for FastembedEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }
        fn dims(&self) -> usize {
            self.dims
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow!("embedding model lock poisoned"))?;
            model
                .embed(texts.to_vec(), Some(self.batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        }
    }

    fn config_to_fastembed_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
        match name {
            "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
            "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
            "bge-large-en-v1.5" => Ok((fastembed::EmbeddingModel::BGELargeENV15, 1024)),
            "nomic-embed-text-v1.5" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768)),
            "multilingual-e5-small" => Ok((fastembed::EmbeddingModel::MultilingualE5Small, 384)),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-small",
                other
            ),
        }
    }
}

/// Create the [`Embedder`] selected by `config`. May download a model;
/// blocking.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dims.unwrap_or(0))?)),
        #[cfg(feature = "local-models")]
        "local" => Ok(Arc::new(FastembedEmbedder::new(config)?)),
        #[cfg(not(feature = "local-models"))]
        "local" => bail!("Local embedding provider requires --features local-models"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
