//! Configuration parsing and validation.
//!
//! `cdocs` is configured through a single TOML file (default
//! `./config/cdocs.toml`). Every section except `[db]` is optional and
//! falls back to the defaults below.
//!
//! ```toml
//! [db]
//! path = "./data/cdocs.sqlite"
//!
//! [data]
//! dir = "./data/docs"              # one subdirectory per topic
//! include_globs = ["**/*.pdf", "**/*.md", "**/*.txt"]
//!
//! [chunking]
//! max_tokens = 256
//!
//! [embedding]
//! provider = "local"               # local | hash
//! model = "all-minilm-l6-v2"
//! batch_size = 128
//!
//! [rerank]
//! provider = "local"               # local | overlap
//! model = "bge-reranker-base"
//!
//! [retrieval]
//! num_retrieved = 50
//! num_ranked = 10
//! context_token_limit = 8000
//! metric = "cosine"                # cosine | l2 | ip
//!
//! [topics.uniswap]
//! description = "Uniswap protocol documentation"
//! ```
//!
//! Tokenizers are configured per use under `[chunking.tokenizer]` and
//! `[retrieval.tokenizer]`:
//!
//! ```toml
//! [retrieval.tokenizer]
//! kind = "huggingface"             # huggingface | whitespace
//! repo = "Xenova/gpt-4"
//! add_special_tokens = false
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use copilot_docs_core::store::DistanceMetric;

/// Tokenizer the chunker measures with, by default.
pub const DEFAULT_CHUNK_TOKENIZER_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// cl100k_base-equivalent vocabulary used for context budgets, by default.
pub const DEFAULT_CONTEXT_TOKENIZER_REPO: &str = "Xenova/gpt-4";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/docs")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
    ]
}

/// Which tokenizer to count with.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TokenizerConfig {
    #[serde(default = "default_tokenizer_kind")]
    pub kind: String,
    /// Hugging Face repo holding a `tokenizer.json`.
    #[serde(default)]
    pub repo: Option<String>,
    /// Local `tokenizer.json`; takes precedence over `repo`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub add_special_tokens: Option<bool>,
}

fn default_tokenizer_kind() -> String {
    "huggingface".to_string()
}

impl TokenizerConfig {
    fn huggingface() -> Self {
        Self {
            kind: default_tokenizer_kind(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "TokenizerConfig::huggingface")]
    pub tokenizer: TokenizerConfig,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            tokenizer: TokenizerConfig::huggingface(),
        }
    }
}

fn default_max_tokens() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_local")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_local(),
            model: default_embedding_model(),
            dims: None,
            batch_size: default_embedding_batch_size(),
        }
    }
}

fn default_local() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_embedding_batch_size() -> usize {
    128
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankConfig {
    #[serde(default = "default_local")]
    pub provider: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_rerank_batch_size")]
    pub batch_size: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: default_local(),
            model: default_rerank_model(),
            batch_size: default_rerank_batch_size(),
        }
    }
}

fn default_rerank_model() -> String {
    "bge-reranker-base".to_string()
}
fn default_rerank_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_num_retrieved")]
    pub num_retrieved: usize,
    #[serde(default = "default_num_ranked")]
    pub num_ranked: usize,
    #[serde(default = "default_context_token_limit")]
    pub context_token_limit: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default = "TokenizerConfig::huggingface")]
    pub tokenizer: TokenizerConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_retrieved: default_num_retrieved(),
            num_ranked: default_num_ranked(),
            context_token_limit: default_context_token_limit(),
            metric: DistanceMetric::default(),
            tokenizer: TokenizerConfig::huggingface(),
        }
    }
}

fn default_num_retrieved() -> usize {
    50
}
fn default_num_ranked() -> usize {
    10
}
fn default_context_token_limit() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TopicConfig {
    #[serde(default)]
    pub description: Option<String>,
    /// Collection name; defaults to the topic name.
    #[serde(default)]
    pub collection: Option<String>,
}

impl Config {
    /// Collection backing `topic`.
    pub fn collection_for(&self, topic: &str) -> String {
        self.topics
            .get(topic)
            .and_then(|t| t.collection.clone())
            .unwrap_or_else(|| topic.to_string())
    }

    pub fn description_for(&self, topic: &str) -> Option<&str> {
        self.topics.get(topic).and_then(|t| t.description.as_deref())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.num_retrieved < 1 {
        bail!("retrieval.num_retrieved must be >= 1");
    }
    if config.retrieval.num_ranked < 1 {
        bail!("retrieval.num_ranked must be >= 1");
    }
    if config.retrieval.context_token_limit == 0 {
        bail!("retrieval.context_token_limit must be > 0");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "local" => {}
        "hash" => {
            if config.embedding.dims.unwrap_or(0) == 0 {
                bail!("embedding.dims must be > 0 when provider is 'hash'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local or hash.",
            other
        ),
    }

    if config.rerank.batch_size == 0 {
        bail!("rerank.batch_size must be > 0");
    }
    match config.rerank.provider.as_str() {
        "local" | "overlap" => {}
        other => bail!(
            "Unknown rerank provider: '{}'. Must be local or overlap.",
            other
        ),
    }

    validate_tokenizer("chunking.tokenizer", &config.chunking.tokenizer)?;
    validate_tokenizer("retrieval.tokenizer", &config.retrieval.tokenizer)?;

    Ok(())
}

fn validate_tokenizer(section: &str, tokenizer: &TokenizerConfig) -> Result<()> {
    match tokenizer.kind.as_str() {
        "huggingface" | "whitespace" => Ok(()),
        other => bail!(
            "Unknown tokenizer kind in {}: '{}'. Must be huggingface or whitespace.",
            section,
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[db]\npath = \"db.sqlite\"\n").unwrap();
        assert_eq!(cfg.chunking.max_tokens, 256);
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.embedding.model, "all-minilm-l6-v2");
        assert_eq!(cfg.embedding.batch_size, 128);
        assert_eq!(cfg.rerank.model, "bge-reranker-base");
        assert_eq!(cfg.retrieval.num_retrieved, 50);
        assert_eq!(cfg.retrieval.num_ranked, 10);
        assert_eq!(cfg.retrieval.context_token_limit, 8000);
        assert_eq!(cfg.retrieval.metric, DistanceMetric::Cosine);
        assert_eq!(cfg.retrieval.tokenizer.kind, "huggingface");
        assert_eq!(cfg.data.include_globs.len(), 3);
    }

    #[test]
    fn test_topic_collection_names() {
        let cfg = parse(
            r#"
            [db]
            path = "db.sqlite"

            [topics.uniswap]
            description = "Uniswap docs"

            [topics.polygon]
            collection = "polygon-v2"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.collection_for("uniswap"), "uniswap");
        assert_eq!(cfg.collection_for("polygon"), "polygon-v2");
        assert_eq!(cfg.collection_for("unknown"), "unknown");
        assert_eq!(cfg.description_for("uniswap"), Some("Uniswap docs"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse("[db]\npath = \"x\"\n[chunking]\nmax_tokens = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\nnum_ranked = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\ncontext_token_limit = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\nmetric = \"hamming\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"hash\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[rerank]\nprovider = \"llm\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[chunking.tokenizer]\nkind = \"bpe\"\n").is_err());
    }

    #[test]
    fn test_offline_backends() {
        let cfg = parse(
            r#"
            [db]
            path = "db.sqlite"

            [embedding]
            provider = "hash"
            dims = 64

            [rerank]
            provider = "overlap"

            [chunking.tokenizer]
            kind = "whitespace"

            [retrieval]
            metric = "l2"

            [retrieval.tokenizer]
            kind = "whitespace"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.embedding.dims, Some(64));
        assert_eq!(cfg.retrieval.metric, DistanceMetric::L2);
        assert_eq!(cfg.chunking.tokenizer.kind, "whitespace");
    }
}
