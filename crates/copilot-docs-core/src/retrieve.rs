//! Two-stage retrieval with a token-budgeted context.
//!
//! A [`Retriever`] answers one query against one collection:
//!
//! 1. Embed the query with the same [`Embedder`] used for ingestion.
//! 2. Fetch the `num_retrieved` nearest chunks from the collection.
//! 3. Score every `(query, chunk)` pair with the [`CrossEncoder`] and
//!    keep the `num_ranked` best, reordering ids, texts, metadata and
//!    distances in lockstep.
//! 4. Concatenate ranked texts, each followed by `"\n\n"`, while the
//!    running token total stays within `context_token_limit`. The first
//!    chunk that would overflow stops assembly; nothing after it is
//!    considered.
//!
//! The retriever holds no state between calls. Model handles are
//! borrowed from a shared [`Models`] value.
//!
//! ```rust
//! use copilot_docs_core::retrieve::RetrievalParams;
//!
//! let params = RetrievalParams::default();
//! assert_eq!(params.num_retrieved, 50);
//! assert_eq!(params.num_ranked, 10);
//! assert_eq!(params.context_token_limit, 8000);
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::embedding::{embed_query, Embedder};
use crate::models::QueryHits;
use crate::rerank::{score_pairs, top_ranked, CrossEncoder, DEFAULT_NUM_RANKED};
use crate::store::Collection;
use crate::tokenize::TokenCounter;

/// Default number of nearest-neighbor candidates fetched per query.
pub const DEFAULT_NUM_RETRIEVED: usize = 50;

/// Default token budget of an assembled context.
pub const DEFAULT_CONTEXT_TOKEN_LIMIT: usize = 8000;

/// Separator appended to every chunk placed in the context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Retrieval tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub num_retrieved: usize,
    pub num_ranked: usize,
    pub context_token_limit: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            num_retrieved: DEFAULT_NUM_RETRIEVED,
            num_ranked: DEFAULT_NUM_RANKED,
            context_token_limit: DEFAULT_CONTEXT_TOKEN_LIMIT,
        }
    }
}

/// Model handles shared by every retrieval and ingestion call.
///
/// Built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct Models {
    pub embedder: Arc<dyn Embedder>,
    pub cross_encoder: Arc<dyn CrossEncoder>,
    /// Counts tokens of the assembled context.
    pub tokenizer: Arc<dyn TokenCounter>,
}

/// Re-ranked candidates with their cross-encoder scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedHits {
    pub hits: QueryHits,
    /// Cross-encoder score per entry of `hits`, non-increasing.
    pub scores: Vec<f32>,
}

/// Full outcome of one retrieval, for callers that want to show their work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Number of nearest-neighbor candidates the store returned.
    pub candidates: usize,
    pub ranked: RankedHits,
    /// How many ranked chunks made it into the context.
    pub included: usize,
    /// Token total of the included chunks.
    pub context_tokens: usize,
    pub context: String,
}

/// Assembled context and its accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub text: String,
    pub included: usize,
    pub tokens: usize,
}

pub struct Retriever<'m> {
    models: &'m Models,
    params: RetrievalParams,
}

impl<'m> Retriever<'m> {
    pub fn new(models: &'m Models, params: RetrievalParams) -> Self {
        Self { models, params }
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Context string for `query` from `collection`.
    ///
    /// An empty collection yields `""`; every other failure propagates.
    pub async fn retrieve(&self, query: &str, collection: &dyn Collection) -> Result<String> {
        Ok(self.retrieve_ranked(query, collection).await?.context)
    }

    /// Like [`retrieve`](Self::retrieve), but keeps the intermediate
    /// ranking.
    pub async fn retrieve_ranked(&self, query: &str, collection: &dyn Collection) -> Result<Retrieval> {
        let hits = self.query_db(query, collection).await?;
        let candidates = hits.len();
        if hits.is_empty() {
            debug!(collection = collection.name(), "no candidates");
            return Ok(Retrieval::default());
        }

        let ranked = self.rank_results(query, &hits)?;
        let context = self.build_context(&ranked.hits.documents)?;
        debug!(
            collection = collection.name(),
            candidates,
            ranked = ranked.hits.len(),
            included = context.included,
            tokens = context.tokens,
            "retrieved context"
        );

        Ok(Retrieval {
            candidates,
            ranked,
            included: context.included,
            context_tokens: context.tokens,
            context: context.text,
        })
    }

    /// Embed `query` and fetch its nearest neighbors.
    pub async fn query_db(&self, query: &str, collection: &dyn Collection) -> Result<QueryHits> {
        let embedding = embed_query(self.models.embedder.as_ref(), query)?;
        let result = collection.query(&[embedding], self.params.num_retrieved).await?;
        Ok(result.into_first())
    }

    /// Score candidates with the cross-encoder and keep the best
    /// `num_ranked`. Equal scores keep their nearest-neighbor order.
    pub fn rank_results(&self, query: &str, hits: &QueryHits) -> Result<RankedHits> {
        let scores = score_pairs(self.models.cross_encoder.as_ref(), query, &hits.documents)?;
        let order = top_ranked(&scores, self.params.num_ranked);
        Ok(RankedHits {
            hits: hits.select(&order),
            scores: order.iter().map(|&i| scores[i]).collect(),
        })
    }

    /// Concatenate `documents` in order until the token budget would be
    /// exceeded.
    pub fn build_context(&self, documents: &[String]) -> Result<Context> {
        let mut ctx = Context::default();
        for doc in documents {
            let piece = format!("{}{}", doc, CONTEXT_SEPARATOR);
            let tokens = self.models.tokenizer.count_tokens(&piece)?;
            if ctx.tokens + tokens > self.params.context_token_limit {
                break;
            }
            ctx.tokens += tokens;
            ctx.text.push_str(&piece);
            ctx.included += 1;
        }
        Ok(ctx)
    }
}
