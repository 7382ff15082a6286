//! # copilot-docs core
//!
//! Pure retrieval logic for the documentation copilot: chunk models,
//! token-bounded chunking, model traits (embedder, cross-encoder,
//! tokenizer), the vector store contract with an in-memory
//! implementation, collection bootstrap, and the two-stage retriever
//! (embedding similarity followed by cross-encoder re-ranking under a
//! token budget).
//!
//! This crate has no filesystem, database, or async runtime
//! dependencies. Concrete model backends and the SQLite store live in
//! the `copilot-docs` application crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Chunk records, metadata, query hits |
//! | [`tokenize`] | Token counting trait |
//! | [`chunk`] | Greedy token-bounded page chunker |
//! | [`embedding`] | Embedder trait and vector math |
//! | [`rerank`] | Cross-encoder trait and stable top-N selection |
//! | [`store`] | Vector store contract and in-memory store |
//! | [`ingest`] | Batched indexing and idempotent collection bootstrap |
//! | [`retrieve`] | Query → candidates → re-rank → budgeted context |
//! | [`trace`] | Transaction trace address and contract-source helpers |

pub mod chunk;
pub mod embedding;
pub mod ingest;
pub mod models;
pub mod rerank;
pub mod retrieve;
pub mod store;
pub mod tokenize;
pub mod trace;
