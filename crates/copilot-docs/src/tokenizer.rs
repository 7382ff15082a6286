//! Token counters backed by Hugging Face `tokenizer.json` files.
//!
//! A `huggingface` tokenizer is loaded from a local file or downloaded
//! once from the Hugging Face hub into
//! `~/.cache/copilot-docs/tokenizers/<repo>/tokenizer.json`. Truncation
//! and padding are disabled so the count is the true encoded length.
//!
//! Loading may hit the network through `reqwest::blocking`; call
//! [`create_token_counter`] off the async runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info};

use copilot_docs_core::tokenize::{TokenCounter, WhitespaceTokenCounter};

use crate::config::TokenizerConfig;

/// Counts tokens with a `tokenizers::Tokenizer`.
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
    add_special_tokens: bool,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path, add_special_tokens: bool) -> Result<Self> {
        let mut tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Load tokenizer {}: {}", path.display(), e))?;
        tokenizer
            .with_truncation(None)
            .map_err(|e| anyhow!("Disable truncation: {}", e))?;
        tokenizer.with_padding(None);
        Ok(Self {
            tokenizer,
            add_special_tokens,
        })
    }

    /// Load `tokenizer.json` from a Hugging Face repo, downloading it on
    /// first use.
    pub fn from_repo(repo: &str, add_special_tokens: bool) -> Result<Self> {
        let path = cache_dir()?
            .join(repo.replace('/', "--"))
            .join("tokenizer.json");
        download_to_cache(repo, "tokenizer.json", &path)?;
        Self::from_file(&path, add_special_tokens)
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, self.add_special_tokens)
            .map_err(|e| anyhow!("Tokenize: {}", e))?;
        Ok(encoding.get_ids().len())
    }
}

fn cache_dir() -> Result<PathBuf> {
    let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = PathBuf::from(base)
        .join(".cache")
        .join("copilot-docs")
        .join("tokenizers");
    std::fs::create_dir_all(&dir).map_err(|e| anyhow!("Create cache dir: {}", e))?;
    Ok(dir)
}

fn download_to_cache(repo: &str, path: &str, cache_path: &Path) -> Result<()> {
    if cache_path.exists() {
        return Ok(());
    }
    let url = format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo,
        path.replace(' ', "%20")
    );
    info!(%url, "downloading tokenizer");
    let resp = reqwest::blocking::get(&url)
        .map_err(|e| anyhow!("Download {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| anyhow!("Download {}: {}", url, e))?;
    let bytes = resp.bytes().map_err(|e| anyhow!("Read body: {}", e))?;
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| anyhow!("Create cache parent: {}", e))?;
    }
    std::fs::write(cache_path, &bytes).map_err(|e| anyhow!("Write cache: {}", e))?;
    Ok(())
}

/// Build the [`TokenCounter`] described by `config`.
///
/// `default_repo` and `default_special` apply when the config leaves
/// them unset.
pub fn create_token_counter(
    config: &TokenizerConfig,
    default_repo: &str,
    default_special: bool,
) -> Result<Arc<dyn TokenCounter>> {
    let add_special = config.add_special_tokens.unwrap_or(default_special);
    match config.kind.as_str() {
        "whitespace" => Ok(Arc::new(WhitespaceTokenCounter)),
        "huggingface" => {
            let counter = match &config.path {
                Some(path) => HfTokenCounter::from_file(path, add_special)?,
                None => {
                    let repo = config.repo.as_deref().unwrap_or(default_repo);
                    HfTokenCounter::from_repo(repo, add_special)?
                }
            };
            debug!(add_special, "loaded huggingface tokenizer");
            Ok(Arc::new(counter))
        }
        other => bail!("Unknown tokenizer kind: {}", other),
    }
}
