//! Topic ingestion: extract, chunk, embed, store.
//!
//! `cdocs ingest` bootstraps one collection per topic with
//! [`ensure_populated`]: a collection that already has records is
//! skipped, an empty one is filled from the topic's files. `cdocs chunk`
//! runs extraction and chunking for a single file without touching the
//! store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use copilot_docs_core::chunk::Chunker;
use copilot_docs_core::ingest::{ensure_populated, ChunkSource, IngestOptions, IngestOutcome};
use copilot_docs_core::models::DocChunk;
use copilot_docs_core::tokenize::TokenCounter;

use crate::backends;
use crate::config::Config;
use crate::extract::{extract_pages, source_name};
use crate::sqlite_store;
use crate::topics::discover_topics;

/// Chunks one topic's files by extracting their pages and running the
/// [`Chunker`]. Source names are qualified by the topic, see
/// [`source_name`].
pub struct PageChunkSource {
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
    topic: String,
    topic_dir: PathBuf,
}

impl PageChunkSource {
    pub fn new(
        counter: Arc<dyn TokenCounter>,
        max_tokens: usize,
        topic: impl Into<String>,
        topic_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            counter,
            max_tokens,
            topic: topic.into(),
            topic_dir: topic_dir.into(),
        }
    }

    /// Source for a lone file, treating its parent directory as the topic.
    pub fn for_file(counter: Arc<dyn TokenCounter>, max_tokens: usize, file: &Path) -> Self {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let topic = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::new(counter, max_tokens, topic, dir)
    }
}

impl ChunkSource for PageChunkSource {
    fn chunk_file(&self, path: &Path) -> Result<Vec<DocChunk>> {
        let pages = extract_pages(path)?;
        let source = source_name(&self.topic, &self.topic_dir, path);
        Chunker::new(self.counter.as_ref(), self.max_tokens).chunk_pages(&pages, &source)
    }
}

/// `cdocs ingest [--topic T]`.
pub async fn run_ingest(config: &Config, topic: Option<&str>) -> Result<()> {
    let mut topics = discover_topics(config)?;
    if let Some(name) = topic {
        topics.retain(|t| t.name == name);
        if topics.is_empty() {
            bail!(
                "Unknown topic: '{}'. Topics are the subdirectories of {}",
                name,
                config.data.dir.display()
            );
        }
    }

    let (embedder, counter) = backends::load_ingest_models(config).await?;
    let store = sqlite_store::open(config).await?;
    let opts = IngestOptions {
        batch_size: config.embedding.batch_size,
        metric: config.retrieval.metric,
    };

    for t in &topics {
        let source = PageChunkSource::new(
            counter.clone(),
            config.chunking.max_tokens,
            t.name.as_str(),
            t.dir.as_path(),
        );
        let outcome = ensure_populated(
            &store,
            &t.collection,
            &t.files,
            &source,
            embedder.as_ref(),
            &opts,
        )
        .await
        .with_context(|| format!("Ingestion failed for topic '{}'", t.name))?;

        match outcome {
            IngestOutcome::Skipped { count } => {
                println!("{}: skipped (already holds {} records)", t.name, count);
            }
            IngestOutcome::Populated {
                files,
                chunks,
                batches,
            } => {
                println!(
                    "{}: populated {} chunks from {} files in {} batches",
                    t.name, chunks, files, batches
                );
            }
        }
    }

    store.pool().close().await;
    println!("ok");
    Ok(())
}

/// `cdocs chunk <file>`: print the chunks a file would produce.
pub async fn run_chunk_preview(config: &Config, file: &Path) -> Result<()> {
    let counter = backends::load_chunk_tokenizer(config).await?;
    let source = PageChunkSource::for_file(counter.clone(), config.chunking.max_tokens, file);
    let chunks = source.chunk_file(file)?;

    println!("{:<14} {:>5} {:>6} {:>7}  PREVIEW", "ID", "PAGE", "CHUNK", "TOKENS");
    for c in &chunks {
        let tokens = counter.count_tokens(&c.text)?;
        let preview: String = c.text.chars().take(60).collect::<String>().replace('\n', " ");
        println!(
            "{:<14} {:>5} {:>6} {:>7}  {}",
            c.id, c.metadata.page_number, c.metadata.chunk_number, tokens, preview
        );
    }
    println!("chunks: {}", chunks.len());
    Ok(())
}
