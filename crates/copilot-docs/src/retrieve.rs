//! `cdocs retrieve <topic> <query>`.
//!
//! Opens the topic's collection (creating it empty if it was never
//! ingested), runs the two-stage [`Retriever`], and prints the assembled
//! context. With `--explain`, the ranked candidates are listed first.

use anyhow::Result;

use copilot_docs_core::retrieve::{Retrieval, Retriever};
use copilot_docs_core::store::VectorStore;

use crate::backends;
use crate::config::Config;
use crate::sqlite_store;

/// Retrieve the context for `query` from `topic`'s collection.
pub async fn retrieve_context(config: &Config, topic: &str, query: &str) -> Result<Retrieval> {
    let models = backends::load_models(config).await?;
    let store = sqlite_store::open(config).await?;
    let collection = store
        .get_or_create_collection(&config.collection_for(topic), config.retrieval.metric)
        .await?;

    let retriever = Retriever::new(&models, backends::retrieval_params(config));
    let retrieval = retriever.retrieve_ranked(query, collection.as_ref()).await?;

    store.pool().close().await;
    Ok(retrieval)
}

pub async fn run_retrieve(config: &Config, topic: &str, query: &str, explain: bool) -> Result<()> {
    let retrieval = retrieve_context(config, topic, query).await?;

    if explain {
        println!(
            "candidates: {}  ranked: {}  included: {}  tokens: {}",
            retrieval.candidates,
            retrieval.ranked.hits.len(),
            retrieval.included,
            retrieval.context_tokens
        );
        println!(
            "{:<4} {:<14} {:>9} {:>9}  SOURCE",
            "RANK", "ID", "DISTANCE", "SCORE"
        );
        let hits = &retrieval.ranked.hits;
        for i in 0..hits.len() {
            let meta = &hits.metadatas[i];
            println!(
                "{:<4} {:<14} {:>9.4} {:>9.4}  {} p{} #{}",
                i + 1,
                hits.ids[i],
                hits.distances[i],
                retrieval.ranked.scores[i],
                meta.source,
                meta.page_number,
                meta.chunk_number
            );
        }
        println!("---");
    }

    print!("{}", retrieval.context);
    Ok(())
}
