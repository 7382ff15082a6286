//! Cross-encoder backends.
//!
//! `local` runs a fastembed `TextRerank` model (feature `local-models`);
//! `overlap` is an offline scorer for tests and model-free setups.
//! Whatever order a backend produces internally, scores are returned in
//! input order.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};

use copilot_docs_core::rerank::CrossEncoder;

use crate::config::RerankConfig;

/// Scores a document by the fraction of distinct query terms it contains.
pub struct OverlapCrossEncoder;

fn terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

impl CrossEncoder for OverlapCrossEncoder {
    fn model_name(&self) -> &str {
        "overlap"
    }

    fn predict(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(vec![0.0; documents.len()]);
        }
        Ok(documents
            .iter()
            .map(|doc| {
                let doc_terms = terms(doc);
                let hits = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
                hits as f32 / query_terms.len() as f32
            })
            .collect())
    }
}

#[cfg(feature = "local-models")]
pub use local::FastembedReranker;

#[cfg(feature = "local-models")]
mod local {
    use std::sync::Mutex;

    use anyhow::{anyhow, bail, Result};
    use tracing::info;

    use copilot_docs_core::rerank::CrossEncoder;

    use crate::config::RerankConfig;

    /// Local cross-encoder via fastembed.
    pub struct FastembedReranker {
        model_name: String,
        batch_size: usize,
        model: Mutex<fastembed::TextRerank>,
    }

    impl FastembedReranker {
        /// Load (and on first use, download) the configured model.
        /// Blocking.
        pub fn new(config: &RerankConfig) -> Result<Self> {
            let reranker_model = config_to_reranker_model(&config.model)?;
            info!(model = %config.model, "loading cross-encoder");
            let model = fastembed::TextRerank::try_new(
                fastembed::RerankInitOptions::new(reranker_model).with_show_download_progress(true),
            )
            .map_err(|e| anyhow!("Failed to initialize cross-encoder: {}", e))?;

            Ok(Self {
                model_name: config.model.clone(),
                batch_size: config.batch_size,
                model: Mutex::new(model),
            })
        }
    }

    impl CrossEncoder for FastembedReranker {
        fn model_name(&self) -> &str {
            &self.model_name
        }

        fn predict(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
            let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow!("cross-encoder lock poisoned"))?;
            let results = model
                .rerank(query, docs, false, Some(self.batch_size))
                .map_err(|e| anyhow!("Re-ranking failed: {}", e))?;

            // Results come back sorted by score; put them back in input order.
            let mut scores: Vec<Option<f32>> = vec![None; documents.len()];
            for r in results {
                match scores.get_mut(r.index) {
                    Some(slot) => *slot = Some(r.score),
                    None => bail!("cross-encoder returned out-of-range index {}", r.index),
                }
            }
            scores
                .into_iter()
                .enumerate()
                .map(|(i, s)| s.ok_or_else(|| anyhow!("cross-encoder returned no score for document {}", i)))
                .collect()
        }
    }

    fn config_to_reranker_model(name: &str) -> Result<fastembed::RerankerModel> {
        match name {
            "bge-reranker-base" => Ok(fastembed::RerankerModel::BGERerankerBase),
            "bge-reranker-v2-m3" => Ok(fastembed::RerankerModel::BGERerankerV2M3),
            "jina-reranker-v1-turbo-en" => Ok(fastembed::RerankerModel::JINARerankerV1TurboEn),
            other => bail!(
                "Unknown local rerank model: '{}'. Supported models: \
                 bge-reranker-base, bge-reranker-v2-m3, jina-reranker-v1-turbo-en",
                other
            ),
        }
    }
}

/// Create the [`CrossEncoder`] selected by `config`. May download a
/// model; blocking.
pub fn create_cross_encoder(config: &RerankConfig) -> Result<Arc<dyn CrossEncoder>> {
    match config.provider.as_str() {
        "overlap" => Ok(Arc::new(OverlapCrossEncoder)),
        #[cfg(feature = "local-models")]
        "local" => Ok(Arc::new(FastembedReranker::new(config)?)),
        #[cfg(not(feature = "local-models"))]
        "local" => bail!("Local rerank provider requires --features local-models"),
        other => bail!("Unknown rerank provider: {}", other),
    }
}
