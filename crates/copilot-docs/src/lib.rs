//! # Copilot Docs
//!
//! **Topic-scoped documentation retrieval for a protocol-debugging copilot.**
//!
//! Each subdirectory of the data directory is a *topic* (one protocol's
//! docs). Ingestion extracts pages from the topic's PDF and text files,
//! splits them into sentence-aligned chunks under a token limit, embeds
//! them, and stores them in a per-topic collection. Retrieval embeds a
//! query, takes the nearest candidates, re-ranks them with a
//! cross-encoder and packs the best into a token-budgeted context string.
//!
//! The pipeline logic lives in [`copilot_docs_core`]; this crate supplies
//! the SQLite store, model backends, file extraction and the `cdocs` CLI.
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────┐   ┌──────────────┐
//! │ data/    │──▶│ extract +  │──▶│ embed   │──▶│ SQLite       │
//! │ <topic>/ │   │ chunk      │   │ batches │   │ collections  │
//! └──────────┘   └────────────┘   └─────────┘   └──────┬───────┘
//!                                                      │ query
//!                 ┌─────────┐   ┌────────────┐   ┌─────▼──────┐
//!                 │ context │◀──│ cross-enc. │◀──│ top-N by   │
//!                 │ budget  │   │ re-rank    │   │ distance   │
//!                 └─────────┘   └────────────┘   └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema for collections and records |
//! | [`sqlite_store`] | SQLite implementation of the vector store contract |
//! | [`extract`] | Page extraction from PDF and text files |
//! | [`topics`] | Topic discovery under the data directory |
//! | [`tokenizer`] | HuggingFace tokenizer-backed token counting |
//! | [`embedding`] | Embedding backends (fastembed, hash) |
//! | [`rerank`] | Cross-encoder backends (fastembed, overlap) |
//! | [`backends`] | Loading model handles off the async runtime |
//! | [`ingest`] | `cdocs ingest` and `cdocs chunk` |
//! | [`retrieve`] | `cdocs retrieve` |
//! | [`trace_cmd`] | `cdocs trace` and `cdocs contracts` |

pub mod backends;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod rerank;
pub mod retrieve;
pub mod sqlite_store;
pub mod tokenizer;
pub mod topics;
pub mod trace_cmd;
