//! Startup construction of model handles.
//!
//! Model loading may download weights or tokenizer files with blocking
//! I/O, so every loader runs on tokio's blocking pool.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use copilot_docs_core::embedding::Embedder;
use copilot_docs_core::retrieve::{Models, RetrievalParams};
use copilot_docs_core::tokenize::TokenCounter;

use crate::config::{
    Config, DEFAULT_CHUNK_TOKENIZER_REPO, DEFAULT_CONTEXT_TOKENIZER_REPO,
};
use crate::embedding::create_embedder;
use crate::rerank::create_cross_encoder;
use crate::tokenizer::create_token_counter;

/// Embedder plus the tokenizer chunk sizes are measured with.
pub async fn load_ingest_models(config: &Config) -> Result<(Arc<dyn Embedder>, Arc<dyn TokenCounter>)> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let embedder = create_embedder(&config.embedding)?;
        let counter = create_token_counter(
            &config.chunking.tokenizer,
            DEFAULT_CHUNK_TOKENIZER_REPO,
            true,
        )?;
        info!(embedder = embedder.model_name(), "ingest models ready");
        Ok((embedder, counter))
    })
    .await?
}

/// Tokenizer for chunk previews only.
pub async fn load_chunk_tokenizer(config: &Config) -> Result<Arc<dyn TokenCounter>> {
    let tokenizer = config.chunking.tokenizer.clone();
    tokio::task::spawn_blocking(move || {
        create_token_counter(&tokenizer, DEFAULT_CHUNK_TOKENIZER_REPO, true)
    })
    .await?
}

/// Tokenizer for context and contract-source budgets.
pub async fn load_context_tokenizer(config: &Config) -> Result<Arc<dyn TokenCounter>> {
    let tokenizer = config.retrieval.tokenizer.clone();
    tokio::task::spawn_blocking(move || {
        create_token_counter(&tokenizer, DEFAULT_CONTEXT_TOKENIZER_REPO, false)
    })
    .await?
}

/// Everything retrieval needs: embedder, cross-encoder, context tokenizer.
pub async fn load_models(config: &Config) -> Result<Models> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let embedder = create_embedder(&config.embedding)?;
        let cross_encoder = create_cross_encoder(&config.rerank)?;
        let tokenizer = create_token_counter(
            &config.retrieval.tokenizer,
            DEFAULT_CONTEXT_TOKENIZER_REPO,
            false,
        )?;
        info!(
            embedder = embedder.model_name(),
            cross_encoder = cross_encoder.model_name(),
            "retrieval models ready"
        );
        Ok(Models {
            embedder,
            cross_encoder,
            tokenizer,
        })
    })
    .await?
}

pub fn retrieval_params(config: &Config) -> RetrievalParams {
    RetrievalParams {
        num_retrieved: config.retrieval.num_retrieved,
        num_ranked: config.retrieval.num_ranked,
        context_token_limit: config.retrieval.context_token_limit,
    }
}
