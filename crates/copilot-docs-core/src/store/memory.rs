//! In-memory [`VectorStore`] implementation for tests and ephemeral use.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Queries
//! are brute-force over every stored vector.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::models::ChunkMetadata;

use super::{nearest, validate_add, validate_dims, Collection, DistanceMetric, QueryResult, StoredRecord, VectorStore};

/// In-memory store; nothing survives the process.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Arc<InMemoryCollection>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One collection of an [`InMemoryStore`].
pub struct InMemoryCollection {
    name: String,
    metric: DistanceMetric,
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryCollection {
    fn new(name: &str, metric: DistanceMetric) -> Self {
        Self {
            name: name.to_string(),
            metric,
            records: RwLock::new(Vec::new()),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[ChunkMetadata],
    ) -> Result<()> {
        validate_add(ids, documents, embeddings, metadatas)?;

        let mut records = self.records.write().map_err(poisoned)?;
        validate_dims(records.first().map(|r| r.embedding.len()), embeddings)?;
        let mut seen: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
        let mut skipped = 0usize;

        for i in 0..ids.len() {
            if !seen.insert(ids[i].clone()) {
                skipped += 1;
                continue;
            }
            records.push(StoredRecord {
                id: ids[i].clone(),
                document: documents[i].clone(),
                embedding: embeddings[i].clone(),
                metadata: metadatas[i].clone(),
            });
        }

        if skipped > 0 {
            debug!(collection = %self.name, skipped, "add skipped existing ids");
        }
        Ok(())
    }

    async fn query(&self, query_embeddings: &[Vec<f32>], n_results: usize) -> Result<QueryResult> {
        let records = self.records.read().map_err(poisoned)?;
        let mut result = QueryResult::default();
        for q in query_embeddings {
            result.push(nearest(self.metric, &records, q, n_results)?);
        }
        Ok(result)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<Arc<dyn Collection>> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let collection: Arc<dyn Collection> = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryCollection::new(name, metric)))
            .clone();
        Ok(collection)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
