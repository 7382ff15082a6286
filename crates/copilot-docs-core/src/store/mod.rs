//! Vector store contract.
//!
//! The pipeline talks to persistent storage through two narrow traits:
//! [`VectorStore`] hands out named [`Collection`]s, and a collection
//! supports `count`, add-only `add`, and nearest-neighbor `query`. The
//! SQLite backend in the app crate and [`memory::InMemoryStore`] both
//! implement the same semantics:
//!
//! - `add` never overwrites: ids already present are skipped.
//! - `query` orders by ascending distance under the collection's
//!   [`DistanceMetric`], ties broken by insertion order, and wraps every
//!   field in one outer sequence per query vector.
//! - Locking and write isolation are the store's business.

pub mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, inner_product, squared_l2};
use crate::models::{ChunkMetadata, QueryHits};

/// Distance function of a collection's vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`
    #[default]
    Cosine,
    /// Squared euclidean distance.
    L2,
    /// `1 - dot product`
    Ip,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::Ip => "ip",
        }
    }

    /// Distance between two vectors; smaller is closer.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::L2 => squared_l2(a, b),
            DistanceMetric::Ip => 1.0 - inner_product(a, b),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" => Ok(DistanceMetric::L2),
            "ip" => Ok(DistanceMetric::Ip),
            other => bail!("Unknown distance metric: '{}'. Use cosine, l2, or ip.", other),
        }
    }
}

/// Store response for a batch of query vectors.
///
/// Every field holds one inner sequence per query vector; the pipeline
/// always sends exactly one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<ChunkMetadata>>,
    pub distances: Vec<Vec<f32>>,
}

impl QueryResult {
    pub fn push(&mut self, hits: QueryHits) {
        self.ids.push(hits.ids);
        self.documents.push(hits.documents);
        self.metadatas.push(hits.metadatas);
        self.distances.push(hits.distances);
    }

    /// Unwrap the hits of the first query vector (empty if none).
    pub fn into_first(self) -> QueryHits {
        QueryHits {
            ids: self.ids.into_iter().next().unwrap_or_default(),
            documents: self.documents.into_iter().next().unwrap_or_default(),
            metadatas: self.metadatas.into_iter().next().unwrap_or_default(),
            distances: self.distances.into_iter().next().unwrap_or_default(),
        }
    }
}

/// A stored record, used by backends when ranking in process.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Rank `records` (in insertion order) against `query` and keep the
/// `n_results` nearest.
///
/// Fails if `query` and a stored embedding differ in dimension, which
/// means the collection was built with a different embedding model.
pub fn nearest(
    metric: DistanceMetric,
    records: &[StoredRecord],
    query: &[f32],
    n_results: usize,
) -> Result<QueryHits> {
    let mut scored: Vec<(usize, f32)> = Vec::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        if r.embedding.len() != query.len() {
            bail!(
                "query has {} dimensions but record '{}' has {}; rebuild the collection with the current embedding model",
                query.len(),
                r.id,
                r.embedding.len()
            );
        }
        let d = metric.distance(query, &r.embedding);
        scored.push((i, if d.is_nan() { f32::INFINITY } else { d }));
    }
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(n_results);

    let mut hits = QueryHits::default();
    for (i, d) in scored {
        let r = &records[i];
        hits.ids.push(r.id.clone());
        hits.documents.push(r.document.clone());
        hits.metadatas.push(r.metadata.clone());
        hits.distances.push(d);
    }
    Ok(hits)
}

/// Check that every embedding in an `add` call has the collection's
/// dimension, or, for an empty collection, that they agree with each
/// other.
pub fn validate_dims(existing: Option<usize>, embeddings: &[Vec<f32>]) -> Result<()> {
    let Some(expected) = existing.or_else(|| embeddings.first().map(Vec::len)) else {
        return Ok(());
    };
    if let Some((i, e)) = embeddings.iter().enumerate().find(|(_, e)| e.len() != expected) {
        bail!(
            "add: embedding {} has {} dimensions, collection expects {}",
            i,
            e.len(),
            expected
        );
    }
    Ok(())
}

/// Check that the parallel `add` arguments line up.
pub fn validate_add(
    ids: &[String],
    documents: &[String],
    embeddings: &[Vec<f32>],
    metadatas: &[ChunkMetadata],
) -> Result<()> {
    let n = ids.len();
    if documents.len() != n || embeddings.len() != n || metadatas.len() != n {
        bail!(
            "add: mismatched lengths (ids={}, documents={}, embeddings={}, metadatas={})",
            n,
            documents.len(),
            embeddings.len(),
            metadatas.len()
        );
    }
    Ok(())
}

/// A named set of chunks with embeddings, scoped to one topic.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    fn metric(&self) -> DistanceMetric;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Append records. Ids already present are skipped, not updated.
    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[ChunkMetadata],
    ) -> Result<()>;

    /// Nearest-neighbor search, one result group per query vector.
    async fn query(&self, query_embeddings: &[Vec<f32>], n_results: usize) -> Result<QueryResult>;
}

/// A persistent set of collections keyed by name.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open a collection, creating it empty if missing. An existing
    /// collection keeps the metric it was created with.
    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<Arc<dyn Collection>>;

    /// Names of all existing collections, sorted.
    async fn list_collections(&self) -> Result<Vec<String>>;
}
