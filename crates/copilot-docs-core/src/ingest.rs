//! Batched indexing and idempotent collection bootstrap.
//!
//! [`index_chunks`] embeds chunk texts in fixed-size batches and appends
//! `(id, text, embedding, metadata)` records to a collection, one `add`
//! call per batch. There is no rollback: batches written before a
//! failure stay persisted.
//!
//! [`ensure_populated`] is the startup bootstrap for one topic. It opens
//! (or creates) the topic's collection and, only if the collection is
//! empty, chunks every source file and indexes the result. A non-empty
//! collection is left untouched; this is a one-shot bootstrap, not an
//! incremental sync.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::models::DocChunk;
use crate::store::{Collection, DistanceMetric, VectorStore};

/// Default number of chunks embedded and added per batch.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Produces chunk records for one source file.
///
/// Implemented by the application on top of text extraction and the
/// [`Chunker`](crate::chunk::Chunker).
pub trait ChunkSource: Send + Sync {
    fn chunk_file(&self, path: &Path) -> Result<Vec<DocChunk>>;
}

/// Bootstrap options.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub metric: DistanceMetric,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// What [`ensure_populated`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The collection already held `count` records; nothing was written.
    Skipped { count: usize },
    /// The collection was empty and `chunks` chunks from `files` files
    /// were written in `batches` batches.
    Populated {
        files: usize,
        chunks: usize,
        batches: usize,
    },
}

/// Embed and add `chunks` to `collection` in batches of `batch_size`.
///
/// Returns the number of batches written. Batch order and chunk order
/// within a batch are preserved.
pub async fn index_chunks(
    collection: &dyn Collection,
    embedder: &dyn Embedder,
    chunks: &[DocChunk],
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut batches = 0usize;

    for (i, batch) in chunks.chunks(batch_size).enumerate() {
        let n = i + 1;
        let mut ids = Vec::with_capacity(batch.len());
        let mut texts = Vec::with_capacity(batch.len());
        let mut metadatas = Vec::with_capacity(batch.len());
        for chunk in batch {
            ids.push(chunk.id.clone());
            texts.push(chunk.text.clone());
            metadatas.push(chunk.metadata.clone());
        }

        debug!(collection = collection.name(), batch = n, size = batch.len(), "encode batch");
        let embeddings = embedder
            .embed(&texts)
            .with_context(|| format!("Embedding batch {} for '{}' failed", n, collection.name()))?;
        if embeddings.len() != texts.len() {
            bail!(
                "Embedder '{}' returned {} vectors for {} texts",
                embedder.model_name(),
                embeddings.len(),
                texts.len()
            );
        }

        debug!(collection = collection.name(), batch = n, "add to collection batch");
        collection.add(&ids, &texts, &embeddings, &metadatas).await?;
        batches += 1;
    }

    Ok(batches)
}

/// Populate the collection for `topic` from `files`, unless it already
/// has records.
///
/// Fails before writing anything if two chunks share an id, since the
/// store's add-only dedup would otherwise drop one of them silently.
/// Concurrent calls for the same empty collection are not guarded and
/// may both write; the store's add-only dedup keeps ids unique.
pub async fn ensure_populated(
    store: &dyn VectorStore,
    topic: &str,
    files: &[PathBuf],
    source: &dyn ChunkSource,
    embedder: &dyn Embedder,
    opts: &IngestOptions,
) -> Result<IngestOutcome> {
    let collection = store.get_or_create_collection(topic, opts.metric).await?;

    let count = collection.count().await?;
    if count > 0 {
        info!(topic, count, "collection already populated, skipping ingestion");
        return Ok(IngestOutcome::Skipped { count });
    }

    info!(topic, files = files.len(), "collection empty, ingesting");
    let mut chunks = Vec::new();
    // chunk id -> file that produced it
    let mut owners: HashMap<String, &Path> = HashMap::new();
    for path in files {
        let file_chunks = source
            .chunk_file(path)
            .with_context(|| format!("Failed to chunk {}", path.display()))?;
        debug!(topic, file = %path.display(), chunks = file_chunks.len(), "chunked file");
        for chunk in &file_chunks {
            if let Some(first) = owners.insert(chunk.id.clone(), path.as_path()) {
                bail!(
                    "Chunk id '{}' (source '{}') is produced by both {} and {}",
                    chunk.id,
                    chunk.metadata.source,
                    first.display(),
                    path.display()
                );
            }
        }
        chunks.extend(file_chunks);
    }

    let batches = index_chunks(collection.as_ref(), embedder, &chunks, opts.batch_size).await?;
    info!(topic, chunks = chunks.len(), batches, "collection populated");

    Ok(IngestOutcome::Populated {
        files: files.len(),
        chunks: chunks.len(),
        batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use crate::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl CountingEmbedder {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call,
            }
        }
    }

    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.fail_on_call {
                anyhow::bail!("model unavailable");
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct FixedSource {
        per_file: usize,
    }

    impl ChunkSource for FixedSource {
        fn chunk_file(&self, path: &Path) -> Result<Vec<DocChunk>> {
            let name = path.display().to_string();
            Ok((0..self.per_file)
                .map(|i| DocChunk {
                    id: format!("{}#{}", name, i),
                    text: format!("chunk {} of {}", i, name),
                    metadata: ChunkMetadata {
                        source: name.clone(),
                        page_number: 1,
                        chunk_number: i as u32,
                    },
                })
                .collect())
        }
    }

    fn chunks(n: usize) -> Vec<DocChunk> {
        FixedSource { per_file: n }
            .chunk_file(Path::new("doc"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_chunks_batches() {
        let store = InMemoryStore::new();
        let c = store
            .get_or_create_collection("t", DistanceMetric::Cosine)
            .await
            .unwrap();
        let embedder = CountingEmbedder::new(None);

        let batches = index_chunks(c.as_ref(), &embedder, &chunks(300), 128).await.unwrap();
        assert_eq!(batches, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(c.count().await.unwrap(), 300);
    }

    #[tokio::test]
    async fn test_partial_batches_remain_on_failure() {
        let store = InMemoryStore::new();
        let c = store
            .get_or_create_collection("t", DistanceMetric::Cosine)
            .await
            .unwrap();
        let embedder = CountingEmbedder::new(Some(2));

        let result = index_chunks(c.as_ref(), &embedder, &chunks(10), 4).await;
        assert!(result.is_err());
        assert_eq!(c.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_ensure_populated_is_idempotent() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::new(None);
        let source = FixedSource { per_file: 3 };
        let files = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
        let opts = IngestOptions::default();

        let first = ensure_populated(&store, "uniswap", &files, &source, &embedder, &opts)
            .await
            .unwrap();
        assert_eq!(
            first,
            IngestOutcome::Populated {
                files: 2,
                chunks: 6,
                batches: 1
            }
        );

        let second = ensure_populated(&store, "uniswap", &files, &source, &embedder, &opts)
            .await
            .unwrap();
        assert_eq!(second, IngestOutcome::Skipped { count: 6 });
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let c = store
            .get_or_create_collection("uniswap", DistanceMetric::Cosine)
            .await
            .unwrap();
        assert_eq!(c.count().await.unwrap(), 6);
    }

    /// Names chunks after the file stem only, so `a.md` and `a.txt` collide.
    struct StemSource;

    impl ChunkSource for StemSource {
        fn chunk_file(&self, path: &Path) -> Result<Vec<DocChunk>> {
            let stem = path.file_stem().unwrap().to_string_lossy().to_string();
            Ok(vec![DocChunk {
                id: format!("{}#0", stem),
                text: format!("text of {}", path.display()),
                metadata: ChunkMetadata {
                    source: stem,
                    page_number: 1,
                    chunk_number: 0,
                },
            }])
        }
    }

    #[tokio::test]
    async fn test_ensure_populated_rejects_colliding_chunk_ids() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::new(None);
        let files = vec![
            PathBuf::from("intro.md"),
            PathBuf::from("guide.md"),
            PathBuf::from("intro.txt"),
        ];

        let err = ensure_populated(&store, "uniswap", &files, &StemSource, &embedder, &IngestOptions::default())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("intro.md"), "{}", msg);
        assert!(msg.contains("intro.txt"), "{}", msg);

        // Nothing was written.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        let c = store
            .get_or_create_collection("uniswap", DistanceMetric::Cosine)
            .await
            .unwrap();
        assert_eq!(c.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_populated_no_files_stays_empty() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::new(None);
        let source = FixedSource { per_file: 3 };

        let outcome = ensure_populated(&store, "empty", &[], &source, &embedder, &IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Populated {
                files: 0,
                chunks: 0,
                batches: 0
            }
        );
        assert_eq!(store.list_collections().await.unwrap(), vec!["empty"]);
    }
}
