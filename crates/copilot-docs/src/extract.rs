//! Page text extraction for source documents.
//!
//! PDFs yield one string per page; markdown and plain-text files are a
//! single page. Page order is preserved and page indices are 0-based.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Document formats `cdocs` can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Pdf,
    Text,
}

impl DocKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocKind::Pdf),
            "md" | "markdown" | "txt" => Ok(DocKind::Text),
            _ => Err(ExtractError::UnsupportedType(path.display().to_string())),
        }
    }
}

/// Extract the text of every page of `path`.
pub fn extract_pages(path: &Path) -> Result<Vec<String>, ExtractError> {
    let kind = DocKind::from_path(path)?;
    let io_err = |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    };
    match kind {
        DocKind::Pdf => {
            let bytes = std::fs::read(path).map_err(io_err)?;
            extract_pdf_pages(&bytes)
        }
        DocKind::Text => Ok(vec![std::fs::read_to_string(path).map_err(io_err)?]),
    }
}

pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Source name of a document inside a topic directory:
/// `<topic>-<path relative to the topic dir, without extension>`.
///
/// `data/docs/uniswap/uniswap-v3.pdf` in topic `uniswap` is
/// `uniswap-uniswap-v3`; `data/docs/uniswap/v2/guides/swap.md` is
/// `uniswap-v2/guides/swap`. Files that differ only by extension map to
/// the same name.
pub fn source_name(topic: &str, topic_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(topic_dir).unwrap_or(path);
    let relative = relative.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    format!("{}-{}", topic, parts.join("/"))
}
