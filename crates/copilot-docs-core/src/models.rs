//! Core data models shared by the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Provenance of a chunk inside its source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Topic-qualified document name, e.g. `uniswap-uniswap-docs`.
    pub source: String,
    /// 1-based page number.
    pub page_number: u32,
    /// 0-based, monotonic within a page.
    pub chunk_number: u32,
}

/// The atomic retrieval unit: a bounded span of page text.
///
/// Created once during ingestion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocChunk {
    /// Content-derived identifier, see [`chunk_id`](crate::chunk::chunk_id).
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Nearest-neighbor hits for a single query vector, as parallel sequences.
///
/// Index `i` of every field describes the same candidate. Candidates are
/// ordered by ascending distance as returned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHits {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

impl QueryHits {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Reorder all four sequences in lockstep following `order`.
    ///
    /// Indices outside the current range are ignored; the result never
    /// contains a candidate that was not already present.
    pub fn select(&self, order: &[usize]) -> QueryHits {
        let mut out = QueryHits::default();
        for &i in order {
            if i >= self.len() {
                continue;
            }
            out.ids.push(self.ids[i].clone());
            out.documents.push(self.documents[i].clone());
            out.metadatas.push(self.metadatas[i].clone());
            out.distances.push(self.distances[i]);
        }
        out
    }
}
