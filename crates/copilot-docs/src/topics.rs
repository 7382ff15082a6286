//! Topic discovery.
//!
//! Every immediate subdirectory of `data.dir` is a topic. Its files,
//! filtered by the include/exclude globs and sorted by path, are the
//! topic's sources, and its collection name comes from
//! [`Config::collection_for`]. Two files of a topic may not share a
//! [`source_name`], since chunk ids derive from it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use copilot_docs_core::store::VectorStore;

use crate::config::Config;
use crate::extract::source_name;
use crate::sqlite_store;

/// A topic and the files that populate its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub collection: String,
    pub description: Option<String>,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

pub fn discover_topics(config: &Config) -> Result<Vec<Topic>> {
    let root = &config.data.dir;
    if !root.is_dir() {
        bail!("Data directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.data.include_globs)?;
    let exclude_set = build_globset(&config.data.exclude_globs)?;

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("Failed to read data directory: {}", root.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut topics = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let files = topic_files(&dir, &include_set, &exclude_set)?;
        check_unique_sources(&name, &dir, &files)?;
        topics.push(Topic {
            collection: config.collection_for(&name),
            description: config.description_for(&name).map(str::to_string),
            name,
            dir,
            files,
        });
    }

    Ok(topics)
}

fn topic_files(dir: &Path, include_set: &GlobSet, exclude_set: &GlobSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn check_unique_sources(topic: &str, dir: &Path, files: &[PathBuf]) -> Result<()> {
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for file in files {
        let source = source_name(topic, dir, file);
        if let Some(first) = seen.insert(source.clone(), file.as_path()) {
            bail!(
                "Topic '{}': {} and {} share the source name '{}'; rename or exclude one of them",
                topic,
                first.display(),
                file.display(),
                source
            );
        }
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// `cdocs topics`: list topics with file and record counts.
pub async fn run_topics(config: &Config) -> Result<()> {
    let topics = discover_topics(config)?;
    let store = sqlite_store::open(config).await?;

    println!(
        "{:<20} {:<20} {:>6} {:>8}  DESCRIPTION",
        "TOPIC", "COLLECTION", "FILES", "RECORDS"
    );
    for topic in &topics {
        let collection = store
            .get_or_create_collection(&topic.collection, config.retrieval.metric)
            .await?;
        let records = collection.count().await?;
        println!(
            "{:<20} {:<20} {:>6} {:>8}  {}",
            topic.name,
            topic.collection,
            topic.files.len(),
            records,
            topic.description.as_deref().unwrap_or("-")
        );
    }

    store.pool().close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &Path, extra: &str) -> Config {
        let toml_str = format!(
            "[db]\npath = \"{}/db.sqlite\"\n[data]\ndir = \"{}\"\n{}",
            dir.display(),
            dir.join("docs").display(),
            extra
        );
        toml::from_str(&toml_str).unwrap()
    }

    #[test]
    fn test_discovers_topic_dirs_and_files() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(docs.join("uniswap/guides")).unwrap();
        fs::create_dir_all(docs.join("polygon")).unwrap();
        fs::write(docs.join("uniswap/b.md"), "b").unwrap();
        fs::write(docs.join("uniswap/a.pdf"), "a").unwrap();
        fs::write(docs.join("uniswap/guides/c.txt"), "c").unwrap();
        fs::write(docs.join("uniswap/image.png"), "x").unwrap();
        fs::write(docs.join("stray.md"), "not a topic").unwrap();

        let cfg = config_for(
            tmp.path(),
            "[topics.uniswap]\ndescription = \"Uniswap\"\ncollection = \"uni\"\n",
        );
        let topics = discover_topics(&cfg).unwrap();

        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "polygon");
        assert!(topics[0].files.is_empty());
        assert_eq!(topics[1].name, "uniswap");
        assert_eq!(topics[1].collection, "uni");
        assert_eq!(topics[1].description.as_deref(), Some("Uniswap"));
        let names: Vec<String> = topics[1]
            .files
            .iter()
            .map(|p| p.strip_prefix(&topics[1].dir).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.md", "guides/c.txt"]);
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(docs.join("t/drafts")).unwrap();
        fs::write(docs.join("t/keep.md"), "k").unwrap();
        fs::write(docs.join("t/drafts/skip.md"), "s").unwrap();

        let mut cfg = config_for(tmp.path(), "");
        cfg.data.exclude_globs = vec!["drafts/**".to_string()];
        let topics = discover_topics(&cfg).unwrap();
        assert_eq!(topics[0].files.len(), 1);
        assert!(topics[0].files[0].ends_with("keep.md"));
    }

    #[test]
    fn test_nested_files_with_same_name_are_distinct_sources() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(docs.join("uniswap/v2/guides")).unwrap();
        fs::create_dir_all(docs.join("uniswap/v3/guides")).unwrap();
        fs::write(docs.join("uniswap/v2/guides/swap.md"), "v2").unwrap();
        fs::write(docs.join("uniswap/v3/guides/swap.md"), "v3").unwrap();

        let topics = discover_topics(&config_for(tmp.path(), "")).unwrap();
        let t = &topics[0];
        let sources: Vec<String> = t
            .files
            .iter()
            .map(|f| source_name(&t.name, &t.dir, f))
            .collect();
        assert_eq!(sources, vec!["uniswap-v2/guides/swap", "uniswap-v3/guides/swap"]);
    }

    #[test]
    fn test_same_stem_different_extension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(docs.join("uniswap")).unwrap();
        fs::write(docs.join("uniswap/intro.md"), "md").unwrap();
        fs::write(docs.join("uniswap/intro.txt"), "txt").unwrap();

        let err = discover_topics(&config_for(tmp.path(), "")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("uniswap-intro"), "{}", msg);
        assert!(msg.contains("intro.md") && msg.contains("intro.txt"), "{}", msg);
    }

    #[test]
    fn test_missing_data_dir() {
        let tmp = TempDir::new().unwrap();
        let cfg = config_for(tmp.path(), "");
        assert!(discover_topics(&cfg).is_err());
    }
}
